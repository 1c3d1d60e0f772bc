//! # Nexthub Gate
//!
//! Server side of a video-conferencing web application, built on Axum:
//!
//! - **Edge Request Gate**: security headers on every response, sliding-window
//!   rate limiting of `/api` paths, and sign-in redirects for protected pages
//! - **Token Provider**: short-lived video SDK tokens for the signed-in user,
//!   with a best-effort sync of their profile into PostgreSQL
//! - **Health**: dependency report and readiness probe
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Request ID → Trace → Edge Gate)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, stream token) + static front end         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Services (TokenService, ProfileSync)                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  IdentityProvider │ UserRepository │ CounterStore           │
//! │  (Clerk)          │ (PostgreSQL)   │ (Upstash Redis REST)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use nexthub_gate::db::MemoryUserRepository;
//! use nexthub_gate::identity::{ClerkClient, ClerkSettings};
//! use nexthub_gate::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let identity = ClerkClient::new(
//!         reqwest::Client::new(),
//!         ClerkSettings {
//!             api_url: config.clerk_api_url.clone(),
//!             secret_key: config.clerk_secret_key.clone(),
//!             jwt_key: config.clerk_jwt_key.clone(),
//!         },
//!     )?;
//!
//!     let state = AppState::new(
//!         config,
//!         Arc::new(identity),
//!         Arc::new(MemoryUserRepository::new()),
//!         None,
//!     );
//!     let app = build_router(state)?;
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Rate Limiting
//!
//! Enabled only when both Upstash settings are present:
//! ```bash
//! UPSTASH_REDIS_REST_URL=https://eu1-example.upstash.io UPSTASH_REDIS_REST_TOKEN=... cargo run
//! ```

pub mod config;
pub mod counter_store;
pub mod db;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
pub use routes::build_router;
pub use state::AppState;
