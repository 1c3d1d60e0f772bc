//! HTTP middleware for the edge request gate and observability.
//!
//! - **Edge Gate**: security headers, API rate limiting and auth gating in one layer
//! - **Rate Limiting**: sliding window per client IP over a shared counter store
//! - **Route Matching**: protected/public route tables
//! - **Security Headers**: fixed headers plus the Content-Security-Policy
//! - **Request ID**: generation and propagation for distributed tracing
//!
//! # Architecture
//!
//! ```text
//! Request → Request ID → Trace → Edge Gate → Handler → Response
//!                                   ↓    ↓
//!                                  429  302 /sign-in
//! ```

pub mod gate;
pub mod ip;
pub mod rate_limit;
pub mod request_id;
pub mod route_match;
pub mod security_headers;

pub use gate::{EdgeGateLayer, EdgeGateService};
pub use ip::{LOOPBACK_IP, extract_client_ip};
pub use rate_limit::{
    DEFAULT_LIMIT, DEFAULT_WINDOW, RATE_LIMIT_EXCEEDED_BODY, RateLimitDecision,
    SlidingWindowLimiter,
};
pub use request_id::{REQUEST_ID_HEADER, RequestId, RequestIdLayer};
pub use route_match::{RouteClass, RouteMatcher, RoutePattern, is_api_path};
pub use security_headers::{SecurityHeaders, content_security_policy};
