mod applications;
mod auth_handlers;

use axum::routing::{get, post};
use axum::Json;
use axum::Router;

use crate::auth::middleware::AuthUser;
use crate::dto::MeResponse;
use crate::state::AppState;

/// Routes under the authentication prefix; they share the `auth` quota.
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth_handlers::register))
        .route("/auth/login", post(auth_handlers::login))
}

/// Routes that require a bearer token.
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route(
            "/applications",
            get(applications::list).post(applications::create),
        )
        .route(
            "/applications/{id}",
            get(applications::get_one)
                .put(applications::update)
                .delete(applications::delete),
        )
        .route("/applications/{id}/history", get(applications::history))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn me(user: AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        email: user.subject,
        name: user.name,
    })
}
