//! Sliding-window rate limiting for API routes.
//!
//! # Algorithm
//!
//! At most [`DEFAULT_LIMIT`] requests per client IP in any trailing
//! [`DEFAULT_WINDOW`]. Window state lives in a [`CounterStore`]; this module
//! only builds the key, calls the store's atomic increment-and-check, and
//! turns the outcome into response headers.
//!
//! # Availability Policy
//!
//! The limiter is constructed once at startup, and only when the counter
//! store is configured. Without it, rate limiting is a no-op for the life of
//! the process. A store failure on an individual request admits the request
//! (fail-open); authentication never fails open.
//!
//! # Response Headers
//!
//! - `X-RateLimit-Limit`: configured limit
//! - `X-RateLimit-Remaining`: hits left in the window
//! - `X-RateLimit-Reset`: ISO-8601 time at which the oldest hit expires

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::counter_store::{CounterStore, CounterStoreError, SlidingWindow};

/// Requests allowed per window.
pub const DEFAULT_LIMIT: u32 = 10;

/// Window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

/// Prefix of counter store keys; the client IP is appended.
pub const KEY_PREFIX: &str = "ratelimit_middleware_";

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Body of the 429 response.
pub const RATE_LIMIT_EXCEEDED_BODY: &str = "API rate limit exceeded";

/// Outcome of one `limit` call, as reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub success: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Set the three `X-RateLimit-*` headers.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        let reset = self.reset.to_rfc3339_opts(SecondsFormat::Millis, true);
        for (name, value) in [
            (LIMIT_HEADER, self.limit.to_string()),
            (REMAINING_HEADER, self.remaining.to_string()),
            (RESET_HEADER, reset),
        ] {
            // Integers and RFC 3339 timestamps are always valid header values
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(HeaderName::from_static(name), value);
            }
        }
    }
}

/// Per-IP sliding-window limiter over a shared counter store.
#[derive(Debug, Clone)]
pub struct SlidingWindowLimiter {
    store: Arc<dyn CounterStore>,
    window: SlidingWindow,
}

impl SlidingWindowLimiter {
    /// Limiter with the default 10 requests per 10 seconds.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self::with_window(store, SlidingWindow::new(DEFAULT_LIMIT, DEFAULT_WINDOW))
    }

    pub fn with_window(store: Arc<dyn CounterStore>, window: SlidingWindow) -> Self {
        Self { store, window }
    }

    pub fn window(&self) -> SlidingWindow {
        self.window
    }

    /// Counter store key for a client IP.
    pub fn key_for(client_ip: &str) -> String {
        format!("{KEY_PREFIX}{client_ip}")
    }

    /// Record a request from `client_ip` and report whether it is within budget.
    pub async fn limit(&self, client_ip: &str) -> Result<RateLimitDecision, CounterStoreError> {
        self.limit_at(client_ip, Utc::now()).await
    }

    pub async fn limit_at(
        &self,
        client_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, CounterStoreError> {
        let key = Self::key_for(client_ip);
        let outcome = self
            .store
            .hit(&key, self.window, now.timestamp_millis())
            .await?;

        let reset = DateTime::<Utc>::from_timestamp_millis(outcome.reset_ms).unwrap_or(now);

        Ok(RateLimitDecision {
            success: outcome.admitted,
            limit: self.window.limit,
            remaining: outcome.remaining,
            reset,
        })
    }
}
