use std::sync::Arc;

use applyflow_core::{ApplicationTracker, Clock, RateLimiter, TokenAuthenticator};

use crate::auth::users::UserStore;
use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub limiter: Arc<RateLimiter>,
    pub tokens: Arc<TokenAuthenticator>,
    /// Identity lookup for login and token-to-user resolution.
    pub users: Arc<UserStore>,
    pub tracker: Arc<ApplicationTracker>,
}

impl AppState {
    /// Builds every shared component from a finalized config. Fails if the
    /// signing secret is unusable, so a bad secret stops startup.
    pub fn new(config: ServerConfig, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let secret = config.token_secret()?;
        let tokens = TokenAuthenticator::new(&secret, config.token_ttl(), clock.clone())?;

        let limiter = RateLimiter::new(config.quotas(), clock.clone())
            .with_max_buckets(config.rate_limit.max_buckets);

        let users = UserStore::new();
        for user in &config.users {
            users.insert(&user.name, &user.email, &user.password_hash)?;
        }

        Ok(Self {
            limiter: Arc::new(limiter),
            tokens: Arc::new(tokens),
            users: Arc::new(users),
            tracker: Arc::new(ApplicationTracker::new(clock)),
            config: Arc::new(config),
        })
    }
}
