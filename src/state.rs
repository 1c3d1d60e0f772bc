//! Shared application state for Axum handlers.
//!
//! Every external collaborator is constructed once in `main` and handed in
//! here explicitly, so handlers and middleware never reach for globals:
//!
//! - **Identity**: session resolution and user lookup
//! - **Users**: local profile datastore
//! - **Limiter**: sliding-window rate limiter, present only when the counter
//!   store is configured
//! - **Tokens**: video credential minting (built from the above)
//!
//! # Thread Safety
//!
//! All components are `Arc`-backed and cheap to clone per request.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::db::UserRepository;
use crate::identity::IdentityProvider;
use crate::middleware::SlidingWindowLimiter;
use crate::services::{ProfileSync, StreamTokenSigner, TokenService};

/// Shared application state for Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Identity provider used by the gate and the token service
    pub identity: Arc<dyn IdentityProvider>,
    /// Local user profile store
    pub users: Arc<dyn UserRepository>,
    /// API rate limiter (`None` disables rate limiting)
    pub limiter: Option<SlidingWindowLimiter>,
    /// Video token minting
    pub tokens: TokenService,
    /// Timestamp when the application started
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Config,
        identity: Arc<dyn IdentityProvider>,
        users: Arc<dyn UserRepository>,
        limiter: Option<SlidingWindowLimiter>,
    ) -> Self {
        let tokens = TokenService::new(
            identity.clone(),
            ProfileSync::new(users.clone()),
            StreamTokenSigner::from_config(&config),
        );

        Self {
            config: Arc::new(config),
            identity,
            users,
            limiter,
            tokens,
            started_at: Instant::now(),
        }
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
