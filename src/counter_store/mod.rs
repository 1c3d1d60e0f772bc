//! Distributed counter stores backing the API rate limiter.
//!
//! The store, not the application, is the source of truth for window state.
//! Each implementation must make [`CounterStore::hit`] atomic per key so that
//! concurrent requests from the same client cannot all be admitted past the
//! limit.
//!
//! - [`UpstashStore`]: Redis over the Upstash REST API, one Lua `EVAL` per hit
//! - [`MemoryCounterStore`]: in-process sliding log for single-node use and tests

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

mod memory;
mod upstash;

pub use memory::MemoryCounterStore;
pub use upstash::UpstashStore;

/// Sliding window parameters: at most `limit` hits in any trailing `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlidingWindow {
    pub limit: u32,
    pub window: Duration,
}

impl SlidingWindow {
    pub const fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    pub fn window_ms(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Result of one increment-and-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowOutcome {
    /// Whether this hit was admitted (and recorded).
    pub admitted: bool,
    /// Hits left in the window after this one.
    pub remaining: u32,
    /// Unix milliseconds at which the oldest recorded hit leaves the window.
    pub reset_ms: i64,
}

#[derive(Debug, Error)]
pub enum CounterStoreError {
    #[error("counter store request failed: {0}")]
    Transport(String),

    #[error("counter store returned an error: {0}")]
    Remote(String),

    #[error("unexpected counter store reply: {0}")]
    Protocol(String),
}

/// Atomic increment-and-check over a sliding window.
#[async_trait]
pub trait CounterStore: Send + Sync + fmt::Debug {
    /// Record a hit for `key` at `now_ms` if the window has room.
    async fn hit(
        &self,
        key: &str,
        window: SlidingWindow,
        now_ms: i64,
    ) -> Result<WindowOutcome, CounterStoreError>;
}
