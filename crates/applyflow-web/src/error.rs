use std::time::Duration;

use applyflow_core::{CoreError, ValidationErrors};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::SecondsFormat;
use serde::Serialize;

/// Message for every token failure; the reason is never revealed.
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid or expired credentials";

#[derive(Debug)]
pub enum AppError {
    /// Missing, forged, expired or mismatched token.
    Unauthorized,
    /// Wrong email or password at login.
    InvalidCredentials,
    RateLimited { retry_after: Duration },
    NotFound(String),
    Conflict(String),
    BadRequest(String),
    Validation(ValidationErrors),
    Internal(String),
}

/// JSON body shared by every error response.
///
/// `path` is left empty when the error is raised deep in a handler; the
/// [`attach_request_path`](crate::middleware::request_path::attach_request_path)
/// layer fills it in on the way out.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub timestamp: String,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<ValidationErrors>,
}

impl ErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: message.into(),
            path: String::new(),
            validation_errors: None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Renders the body, keeping a copy in the response extensions so outer
    /// layers can amend it.
    pub fn render(self) -> Response {
        let mut response = (self.status_code(), axum::Json(self.clone())).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl AppError {
    pub fn body(&self) -> ErrorBody {
        match self {
            AppError::Unauthorized => ErrorBody::new(StatusCode::UNAUTHORIZED, INVALID_TOKEN_MESSAGE),
            AppError::InvalidCredentials => {
                ErrorBody::new(StatusCode::UNAUTHORIZED, "Invalid email or password")
            }
            AppError::RateLimited { .. } => ErrorBody::new(
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded. Please try again later.",
            ),
            AppError::NotFound(msg) => ErrorBody::new(StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => ErrorBody::new(StatusCode::CONFLICT, msg.clone()),
            AppError::BadRequest(msg) => ErrorBody::new(StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Validation(fields) => ErrorBody {
                error: "Validation Failed".to_string(),
                validation_errors: Some(fields.clone()),
                ..ErrorBody::new(
                    StatusCode::BAD_REQUEST,
                    "One or more fields have invalid values",
                )
            },
            AppError::Internal(msg) => {
                // Log the real error server-side, return generic message to client
                tracing::error!("Internal error: {}", msg);
                ErrorBody::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred",
                )
            }
        }
    }

    /// Renders the error with the request path already known.
    pub fn into_response_at(self, path: &str) -> Response {
        let mut body = self.body();
        body.path = path.to_string();
        self.finish(body)
    }

    fn finish(self, body: ErrorBody) -> Response {
        let mut response = body.render();
        if let AppError::RateLimited { retry_after } = self {
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&secs.max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = self.body();
        self.finish(body)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Internal(format!("{e:#}"))
    }
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::ApplicationNotFound(_) => AppError::NotFound(e.to_string()),
            CoreError::Duplicate(msg) => AppError::Conflict(msg),
            CoreError::Validation(fields) => AppError::Validation(fields),
            CoreError::Token(_) => AppError::Unauthorized,
            CoreError::Config(_) | CoreError::TokenEncoding(_) => AppError::Internal(e.to_string()),
        }
    }
}
