//! Health endpoint.
//!
//! # Endpoints
//!
//! - `GET /api/health` - Dependency report; 200 if every check passes, else 503
//! - `HEAD /api/health` - Readiness probe; status only, database check only
//!
//! Both responses carry `Cache-Control: no-cache, no-store, must-revalidate`
//! so that probes never see a cached answer.

use std::time::{Duration, Instant};

use axum::Json;
use axum::extract::State;
use axum::http::header::CACHE_CONTROL;
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use secrecy::ExposeSecret;
use tokio::time::timeout;
use tracing::{error, info, instrument};

use crate::metrics;
use crate::models::{HealthFailureResponse, HealthResponse, ServiceStatus};
use crate::state::AppState;

pub const HEALTH_CACHE_CONTROL: &str = "no-cache, no-store, must-revalidate";

/// Upper bound on the whole check; exceeding it is reported as a failed check.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

const NO_CACHE: [(HeaderName, &str); 1] = [(CACHE_CONTROL, HEALTH_CACHE_CONTROL)];

fn response_time(started: Instant) -> String {
    format!("{}ms", started.elapsed().as_millis())
}

fn clerk_configured(state: &AppState) -> bool {
    !state.config.clerk_publishable_key.is_empty()
        && !state.config.clerk_secret_key.expose_secret().is_empty()
}

/// Health check endpoint.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "timestamp": "2024-01-15T10:30:00Z",
///   "responseTime": "3ms",
///   "version": "0.1.0",
///   "environment": "production",
///   "services": { "database": "healthy", "stream": "configured", "clerk": "configured" }
/// }
/// ```
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Response {
    let started = Instant::now();

    let database_healthy = match timeout(HEALTH_CHECK_TIMEOUT, state.users.ping()).await {
        Ok(result) => result.is_ok(),
        Err(_) => {
            let response_time = response_time(started);
            error!(
                error = "database check timed out",
                response_time = %response_time,
                "Health check failed"
            );
            metrics::record_health_check(false, started.elapsed().as_secs_f64());
            let body = HealthFailureResponse {
                status: "unhealthy".to_string(),
                timestamp: Utc::now(),
                response_time,
                error: "Health check failed".to_string(),
            };
            return (StatusCode::SERVICE_UNAVAILABLE, NO_CACHE, Json(body)).into_response();
        }
    };

    let stream_configured = state.tokens.is_configured();
    let clerk_configured = clerk_configured(&state);
    let healthy = database_healthy && stream_configured && clerk_configured;

    let services = ServiceStatus {
        database: if database_healthy { "healthy" } else { "unhealthy" }.to_string(),
        stream: if stream_configured { "configured" } else { "missing_config" }.to_string(),
        clerk: if clerk_configured { "configured" } else { "missing_config" }.to_string(),
    };

    let body = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        timestamp: Utc::now(),
        response_time: response_time(started),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.to_string(),
        services,
    };

    info!(
        status = %body.status,
        response_time = %body.response_time,
        database = %body.services.database,
        stream = %body.services.stream,
        clerk = %body.services.clerk,
        "Health check completed"
    );
    metrics::record_health_check(healthy, started.elapsed().as_secs_f64());

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, NO_CACHE, Json(body)).into_response()
}

/// Readiness probe: database connectivity only, no body.
#[instrument(skip(state))]
pub async fn health_head(State(state): State<AppState>) -> Response {
    let healthy = matches!(
        timeout(HEALTH_CHECK_TIMEOUT, state.users.ping()).await,
        Ok(Ok(()))
    );

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, NO_CACHE).into_response()
}
