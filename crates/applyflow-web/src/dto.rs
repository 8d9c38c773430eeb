use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: &'static str,
    pub name: String,
    pub email: String,
    /// Unix milliseconds.
    pub expires_at: u64,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub email: String,
    pub name: String,
}
