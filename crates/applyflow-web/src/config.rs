use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use applyflow_core::{Quotas, TokenSecret};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;

/// A pre-provisioned account, loaded at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub reminder: ReminderConfig,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Base64-encoded HMAC secret. Empty means "generate one at startup".
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_jwt_ttl_secs")]
    pub jwt_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_general_rpm")]
    pub requests_per_minute: u32,
    #[serde(default = "default_auth_rpm")]
    pub auth_requests_per_minute: u32,
    /// Key clients by the first `X-Forwarded-For` entry. Only safe behind a
    /// proxy that overwrites the header.
    #[serde(default = "default_true")]
    pub trust_forwarded_for: bool,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_max_buckets")]
    pub max_buckets: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReminderConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_stale_days")]
    pub stale_days: u32,
    #[serde(default = "default_reminder_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

impl TlsConfig {
    pub fn is_enabled(&self) -> bool {
        self.cert_path.is_some() && self.key_path.is_some()
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}
fn default_jwt_ttl_secs() -> u64 { 86_400 }
fn default_general_rpm() -> u32 { 100 }
fn default_auth_rpm() -> u32 { 10 }
fn default_true() -> bool { true }
fn default_sweep_interval_secs() -> u64 { 60 }
fn default_max_buckets() -> usize { applyflow_core::rate_limit::DEFAULT_MAX_BUCKETS }
fn default_stale_days() -> u32 { 14 }
fn default_reminder_interval_secs() -> u64 { 86_400 }

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_ttl_secs: default_jwt_ttl_secs(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_general_rpm(),
            auth_requests_per_minute: default_auth_rpm(),
            trust_forwarded_for: true,
            sweep_interval_secs: default_sweep_interval_secs(),
            max_buckets: default_max_buckets(),
        }
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            stale_days: default_stale_days(),
            interval_secs: default_reminder_interval_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            reminder: ReminderConfig::default(),
            tls: TlsConfig::default(),
            users: Vec::new(),
        }
    }
}

/// Secrets that show up in tutorials and sample configs.
const WEAK_SECRETS: &[&str] = &["change-me", "secret", "password", "jwt-secret", "changeme"];

impl ServerConfig {
    pub fn quotas(&self) -> Quotas {
        Quotas {
            auth: self.rate_limit.auth_requests_per_minute,
            general: self.rate_limit.requests_per_minute,
        }
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.auth.jwt_ttl_secs)
    }

    /// Decodes the configured signing secret.
    pub fn token_secret(&self) -> anyhow::Result<TokenSecret> {
        let bytes = BASE64
            .decode(self.auth.jwt_secret.trim())
            .map_err(|e| anyhow::anyhow!("JWT secret is not valid base64: {e}"))?;
        Ok(TokenSecret::new(bytes)?)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("APPLYFLOW_CONFIG").map(PathBuf::from).ok();

        let mut config = match config_path {
            Some(path) => Self::from_toml_str(&std::fs::read_to_string(&path)?)?,
            None => ServerConfig::default(),
        };

        config.apply_env_overrides()?;
        config.finalize()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(addr) = std::env::var("APPLYFLOW_BIND_ADDR") {
            self.bind_addr = addr.parse()?;
        }
        if let Ok(secret) = std::env::var("APPLYFLOW_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(val) = std::env::var("APPLYFLOW_JWT_TTL_SECS") {
            self.auth.jwt_ttl_secs = val.parse()?;
        }
        if let Ok(val) = std::env::var("APPLYFLOW_RATE_LIMIT_RPM") {
            self.rate_limit.requests_per_minute = val.parse()?;
        }
        if let Ok(val) = std::env::var("APPLYFLOW_AUTH_RATE_LIMIT_RPM") {
            self.rate_limit.auth_requests_per_minute = val.parse()?;
        }
        if let Ok(val) = std::env::var("APPLYFLOW_TRUST_FORWARDED_FOR") {
            self.rate_limit.trust_forwarded_for = val.parse()?;
        }
        if let Ok(cert) = std::env::var("APPLYFLOW_TLS_CERT") {
            self.tls.cert_path = Some(cert);
        }
        if let Ok(key) = std::env::var("APPLYFLOW_TLS_KEY") {
            self.tls.key_path = Some(key);
        }
        Ok(())
    }

    /// Fills in a missing secret and rejects configurations that would
    /// silently weaken authentication.
    pub fn finalize(&mut self) -> anyhow::Result<()> {
        if self.auth.jwt_secret.trim().is_empty() {
            self.auth.jwt_secret = BASE64.encode(rand::random::<[u8; 32]>());
            tracing::warn!(
                "No JWT secret configured. Generated random secret (tokens will not survive a restart)."
            );
        }

        if WEAK_SECRETS
            .iter()
            .any(|w| self.auth.jwt_secret.eq_ignore_ascii_case(w))
        {
            anyhow::bail!(
                "JWT secret matches a known weak/placeholder value. \
                 Set a strong random base64 secret via APPLYFLOW_JWT_SECRET."
            );
        }

        // Surface a bad secret now rather than on the first login.
        self.token_secret()?;

        if self.auth.jwt_ttl_secs == 0 {
            anyhow::bail!("auth.jwt_ttl_secs must be greater than zero");
        }

        if self.rate_limit.trust_forwarded_for {
            tracing::warn!(
                "Rate limiting keys clients by X-Forwarded-For. Any client can spoof this header; \
                 set rate_limit.trust_forwarded_for = false unless behind a trusted proxy."
            );
        }

        Ok(())
    }
}
