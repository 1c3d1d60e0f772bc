//! Prometheus metrics for application observability.
//!
//! Metrics are exposed on a dedicated listener (`METRICS_PORT`, default 9090;
//! `0` disables it). Recording functions are safe to call before or without
//! initialization; without an installed recorder they are no-ops.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `gate_rate_limit_decisions_total` - Rate limit outcomes (label: outcome = admitted|rejected|store_error)
//! - `gate_auth_redirects_total` - Protected requests redirected to sign-in
//! - `gate_auth_errors_total` - Identity resolution failures in the gate
//! - `stream_tokens_issued_total` - Video tokens minted (label: status = success|failure)
//! - `profile_sync_total` - Profile sync results (label: result = created|updated|touched|raced|failed)
//! - `health_checks_total` - Health checks served (label: status = healthy|unhealthy)
//!
//! ## Histograms
//! - `health_check_duration_seconds` - Time spent running the health checks

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const RATE_LIMIT_DECISIONS_TOTAL: &str = "gate_rate_limit_decisions_total";
    pub const AUTH_REDIRECTS_TOTAL: &str = "gate_auth_redirects_total";
    pub const AUTH_ERRORS_TOTAL: &str = "gate_auth_errors_total";
    pub const TOKENS_ISSUED_TOTAL: &str = "stream_tokens_issued_total";
    pub const PROFILE_SYNC_TOTAL: &str = "profile_sync_total";
    pub const HEALTH_CHECKS_TOTAL: &str = "health_checks_total";
    pub const HEALTH_CHECK_DURATION_SECONDS: &str = "health_check_duration_seconds";
}

/// Initialize the Prometheus metrics exporter.
///
/// # Errors
///
/// Returns a message if the exporter or its listener cannot be installed.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::RATE_LIMIT_DECISIONS_TOTAL,
        "Rate limit decisions for API requests"
    );
    describe_counter!(
        names::AUTH_REDIRECTS_TOTAL,
        "Unauthenticated requests redirected to sign-in"
    );
    describe_counter!(
        names::AUTH_ERRORS_TOTAL,
        "Identity provider failures during request gating"
    );
    describe_counter!(names::TOKENS_ISSUED_TOTAL, "Video SDK tokens minted");
    describe_counter!(names::PROFILE_SYNC_TOTAL, "Local profile sync results");
    describe_counter!(names::HEALTH_CHECKS_TOTAL, "Health checks served");
    describe_histogram!(
        names::HEALTH_CHECK_DURATION_SECONDS,
        "Health check duration in seconds"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

// =============================================================================
// Counter Recording Functions
// =============================================================================

/// Record a rate limit outcome (`admitted`, `rejected` or `store_error`).
pub fn record_rate_limit_decision(outcome: &'static str) {
    counter!(names::RATE_LIMIT_DECISIONS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_auth_redirect() {
    counter!(names::AUTH_REDIRECTS_TOTAL).increment(1);
}

pub fn record_auth_error() {
    counter!(names::AUTH_ERRORS_TOTAL).increment(1);
}

/// Record a token mint attempt (`success` or `failure`).
pub fn record_token_issued(status: &'static str) {
    counter!(names::TOKENS_ISSUED_TOTAL, "status" => status).increment(1);
}

pub fn record_profile_sync(result: &'static str) {
    counter!(names::PROFILE_SYNC_TOTAL, "result" => result).increment(1);
}

// =============================================================================
// Health
// =============================================================================

pub fn record_health_check(healthy: bool, duration_secs: f64) {
    let status = if healthy { "healthy" } else { "unhealthy" };
    counter!(names::HEALTH_CHECKS_TOTAL, "status" => status).increment(1);
    histogram!(names::HEALTH_CHECK_DURATION_SECONDS).record(duration_secs);
}
