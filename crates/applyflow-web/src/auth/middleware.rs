use applyflow_core::TokenError;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::error::AppError;
use crate::state::AppState;

/// The verified principal behind a protected request.
///
/// Extracting this runs the token check. Because the rate limiter is a
/// middleware wrapping the router, this always happens after admission.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub subject: String,
    pub name: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn log_rejection(reason: TokenError, path: &str) {
    match reason {
        TokenError::Expired => tracing::debug!(path, "rejected expired token"),
        TokenError::InvalidSignature => {
            tracing::warn!(path, "rejected token with invalid signature")
        }
        TokenError::SubjectMismatch => {
            tracing::warn!(path, "rejected token whose subject does not match its account")
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let path = parts.uri.path();

        let token = bearer_token(&parts.headers).ok_or_else(|| {
            tracing::debug!(path, "missing bearer token");
            AppError::Unauthorized
        })?;

        let subject = state.tokens.extract_subject(token).map_err(|reason| {
            log_rejection(reason, path);
            AppError::Unauthorized
        })?;

        let user = state.users.find(&subject).ok_or_else(|| {
            tracing::warn!(path, subject = %subject, "token names an unknown account");
            AppError::Unauthorized
        })?;

        let claims = state
            .tokens
            .verify_subject(token, &user.email)
            .map_err(|reason| {
                log_rejection(reason, path);
                AppError::Unauthorized
            })?;

        Ok(AuthUser {
            subject: claims.sub,
            name: user.name,
        })
    }
}
