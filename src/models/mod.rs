mod api;

pub use api::{HealthFailureResponse, HealthResponse, ServiceStatus, TokenResponse};
