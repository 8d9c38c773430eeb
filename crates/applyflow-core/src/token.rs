//! Stateless signed identity tokens.
//!
//! Tokens are HS256 JWTs carrying the subject, a display name and
//! millisecond-precision issue/expiry instants. Nothing is stored server
//! side: validity is a function of the token bytes, the signing secret and
//! the current time. Rotating the secret invalidates every outstanding token.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::clock::{duration_millis, Clock};
use crate::error::{CoreError, CoreResult};

/// Minimum secret length in bytes (256 bits for HS256).
pub const MIN_SECRET_LEN: usize = 32;

/// Why a presented token was rejected.
///
/// The variants stay distinct inside the process so forgeries can be logged
/// as security events and expiries as routine noise. The HTTP boundary
/// collapses all of them into one generic 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// The token is malformed or its signature does not match the current secret.
    #[error("token signature is invalid")]
    InvalidSignature,

    /// The signature is fine but the expiry instant has passed.
    #[error("token has expired")]
    Expired,

    /// The token is valid but names a different subject than expected.
    #[error("token subject does not match the expected principal")]
    SubjectMismatch,
}

/// Symmetric signing secret, checked for length at construction.
#[derive(Clone)]
pub struct TokenSecret(Vec<u8>);

impl TokenSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> CoreResult<Self> {
        let bytes = bytes.into();
        if bytes.len() < MIN_SECRET_LEN {
            return Err(CoreError::Config(format!(
                "signing secret must be at least {MIN_SECRET_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenSecret(<redacted>)")
    }
}

/// The identity a token is issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Unique login identifier.
    pub subject: String,
    /// Display name carried for downstream convenience.
    pub name: String,
}

/// Decoded token payload. Instants are Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub name: String,
    pub iat_ms: u64,
    pub exp_ms: u64,
}

/// A freshly signed token and its expiry instant (Unix milliseconds).
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at_ms: u64,
}

/// Issues and verifies tokens against one injected secret.
pub struct TokenAuthenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenAuthenticator {
    pub fn new(secret: &TokenSecret, ttl: Duration, clock: Arc<dyn Clock>) -> CoreResult<Self> {
        if ttl.is_zero() {
            return Err(CoreError::Config("token TTL must be non-zero".to_string()));
        }

        // Expiry is checked against the injected clock below, not by jsonwebtoken.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
            clock,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Signs a token for `principal` that expires one TTL from now.
    pub fn issue(&self, principal: &Principal) -> CoreResult<IssuedToken> {
        let now = self.clock.now_millis();
        let expires_at_ms = now.saturating_add(duration_millis(self.ttl));

        let claims = Claims {
            sub: principal.subject.clone(),
            name: principal.name.clone(),
            iat_ms: now,
            exp_ms: expires_at_ms,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| CoreError::TokenEncoding(e.to_string()))?;

        Ok(IssuedToken {
            token,
            expires_at_ms,
        })
    }

    /// Checks the signature, then the expiry, and returns the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(kind = ?e.kind(), "token failed signature verification");
            TokenError::InvalidSignature
        })?;

        let claims = data.claims;
        if self.clock.now_millis() >= claims.exp_ms {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Like [`verify`](Self::verify), but also requires the subject to be
    /// exactly `expected_subject`.
    pub fn verify_subject(&self, token: &str, expected_subject: &str) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.sub != expected_subject {
            return Err(TokenError::SubjectMismatch);
        }
        Ok(claims)
    }

    /// Returns `true` only for a valid, unexpired token naming `expected_subject`.
    pub fn validate_for_principal(&self, token: &str, expected_subject: &str) -> bool {
        self.verify_subject(token, expected_subject).is_ok()
    }

    /// Returns the subject of a fully verified token.
    pub fn extract_subject(&self, token: &str) -> Result<String, TokenError> {
        self.verify(token).map(|claims| claims.sub)
    }
}

impl fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
