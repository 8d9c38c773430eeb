use applyflow_core::ValidationErrors;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::auth::password::{self, MIN_PASSWORD_LEN};
use crate::auth::users::{normalize_email, UserRecord};
use crate::dto::{AuthResponse, LoginRequest, RegisterRequest};
use crate::error::AppError;
use crate::state::AppState;

fn validate_registration(body: &RegisterRequest) -> Result<(), AppError> {
    let mut errors = ValidationErrors::new();

    if body.name.trim().is_empty() {
        errors.insert("name".to_string(), "Name is required".to_string());
    }
    let email = body.email.trim();
    if email.is_empty() || !email.contains('@') {
        errors.insert("email".to_string(), "A valid email is required".to_string());
    }
    if body.password.chars().count() < MIN_PASSWORD_LEN {
        errors.insert(
            "password".to_string(),
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

fn token_response(state: &AppState, user: &UserRecord) -> Result<AuthResponse, AppError> {
    let issued = state.tokens.issue(&user.principal())?;
    Ok(AuthResponse {
        token: issued.token,
        token_type: "Bearer",
        name: user.name.clone(),
        email: user.email.clone(),
        expires_at: issued.expires_at_ms,
    })
}

/// The hash a login attempt is verified against.
fn hash_to_check(user: Option<&UserRecord>) -> anyhow::Result<String> {
    match user {
        Some(user) => Ok(user.password_hash.clone()),
        None => Ok(password::decoy_hash()?.to_string()),
    }
}

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let Json(body) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    validate_registration(&body)?;

    // Cheap pre-check so a taken email does not cost an argon2 hash.
    if state.users.contains(&body.email) {
        return Err(AppError::Conflict("Email is already registered".to_string()));
    }

    let hash = password::hash_password_blocking(body.password).await?;
    let user = state.users.insert(&body.name, &body.email, &hash)?;

    tracing::info!("Registered new user: {}", user.email);
    Ok((StatusCode::CREATED, Json(token_response(&state, &user)?)))
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let Json(body) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let email = normalize_email(&body.email);

    // Unknown emails are checked against a decoy so both paths cost one
    // argon2 verification.
    let user = state.users.find(&email);
    let hash = hash_to_check(user.as_ref())?;
    let valid = password::verify_password_blocking(hash, body.password).await?;

    let Some(user) = user else {
        tracing::warn!("Failed login attempt for unknown user: {email}");
        return Err(AppError::InvalidCredentials);
    };
    if !valid {
        tracing::warn!("Failed login attempt for user: {email}");
        return Err(AppError::InvalidCredentials);
    }

    tracing::info!("Login succeeded for user: {email}");
    Ok(Json(token_response(&state, &user)?))
}
