use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error types with appropriate HTTP status codes.
///
/// # Dependency Errors
///
/// Failures of external collaborators are split into specific variants so
/// callers can log them with the right context:
///
/// - `Identity` - The identity provider could not be reached or answered badly
/// - `Database` - The profile datastore is unreachable or rejected a query
///
/// Rate-limit store failures never become an `AppError`: the gate logs them
/// and admits the request.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid configuration: {}", .0.join("; "))]
    Config(Vec<String>),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("User is not logged in")]
    Unauthenticated,

    #[error("Service is misconfigured: {0}")]
    Misconfigured(String),

    #[error("Identity provider error: {0}")]
    Identity(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body for API endpoints.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full error details server-side for debugging
        // but only expose sanitized messages to clients
        tracing::error!(error = %self, "Request failed");

        let (status, error_type, message) = match &self {
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "User is not logged in",
            ),

            // Upstream availability errors - don't leak connection details
            AppError::Identity(_) => (
                StatusCode::BAD_GATEWAY,
                "identity_error",
                "Identity provider is temporarily unavailable. Please try again later.",
            ),
            AppError::Database(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "database_error",
                "Datastore is temporarily unavailable. Please try again later.",
            ),

            // Internal errors - never expose internal details to clients
            AppError::Misconfigured(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "misconfigured",
                "Stream configuration is incomplete",
            ),
            AppError::Config(_) | AppError::ConfigError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                "Service configuration error. Please contact support.",
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred. Please contact support if the issue persists.",
            ),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: message.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
