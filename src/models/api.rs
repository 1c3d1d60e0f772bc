use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-dependency health detail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceStatus {
    /// `healthy` or `unhealthy`
    pub database: String,
    /// `configured` or `missing_config`
    pub stream: String,
    /// `configured` or `missing_config`
    pub clerk: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `healthy` or `unhealthy`
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// Time spent running the checks, e.g. `"3ms"`
    pub response_time: String,
    pub version: String,
    pub environment: String,
    pub services: ServiceStatus,
}

/// Body returned when the health check itself could not complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthFailureResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub response_time: String,
    pub error: String,
}

/// Video SDK credential for the signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}
