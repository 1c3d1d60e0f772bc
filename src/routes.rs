//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← Adds X-Request-Id header
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │    Edge Gate     │ ← security headers, 429 on /api, 302 on protected pages
//! └────────┬─────────┘
//!          ▼
//!   Handler / static front end
//! ```
//!
//! # Route Groups
//!
//! - `GET`/`HEAD /api/health` - Health & readiness (public)
//! - `POST /api/stream/token` - Video credential for the signed-in user
//! - everything else - static front end from `STATIC_DIR`, `index.html` fallback

use std::path::Path;

use axum::Router;
use axum::routing::{get, post};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::AppResult;
use crate::handlers;
use crate::middleware::{EdgeGateLayer, RequestIdLayer};
use crate::state::AppState;

/// Build the application router with all routes and middleware configured.
///
/// # Errors
///
/// Returns an error if the gate cannot be built from the configuration
/// (invalid sign-in URL or security header value).
pub fn build_router(state: AppState) -> AppResult<Router> {
    let gate = EdgeGateLayer::from_state(&state)?;
    if gate.rate_limiting_enabled() {
        info!("API rate limiting enabled");
    } else {
        info!("API rate limiting disabled (counter store not configured)");
    }

    let static_dir = Path::new(&state.config.static_dir);
    let front_end =
        ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    let router = Router::new()
        .route(
            "/api/health",
            get(handlers::health_check).head(handlers::health_head),
        )
        .route("/api/stream/token", post(handlers::issue_stream_token))
        .fallback_service(front_end)
        .with_state(state)
        .layer(gate)
        .layer(TraceLayer::new_for_http())
        .layer(RequestIdLayer::new());

    Ok(router)
}
