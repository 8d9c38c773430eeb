//! Error types for `applyflow-core`.
//!
//! Fallible operations in the core library return [`CoreResult<T>`], an alias
//! for `Result<T, CoreError>`. Token verification has its own narrower
//! [`TokenError`](crate::token::TokenError) so the rejection reason survives
//! until the HTTP boundary decides how much of it to reveal.

use std::collections::BTreeMap;

use crate::token::TokenError;

/// Field name to human-readable message, ordered for stable output.
pub type ValidationErrors = BTreeMap<String, String>;

/// Unified error type for all core operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// No application with this id exists for the requesting owner.
    #[error("job application not found with id: {0}")]
    ApplicationNotFound(u64),

    /// A resource with the same unique key already exists.
    #[error("{0}")]
    Duplicate(String),

    /// One or more input fields failed validation.
    #[error("one or more fields have invalid values")]
    Validation(ValidationErrors),

    /// Startup configuration is unusable (bad secret, zero quota, ...).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Signing a token failed.
    #[error("token encoding failed: {0}")]
    TokenEncoding(String),

    /// A presented token was rejected.
    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Convenience alias used throughout `applyflow-core`.
pub type CoreResult<T> = Result<T, CoreError>;
