//! Edge request gate.
//!
//! Runs in front of every route, in this order:
//!
//! 1. **Security headers**: computed once at construction, stamped on every
//!    response the gate returns, whichever branch produced it.
//! 2. **Rate limiting**: `/api` paths only, and only when a limiter exists.
//!    A rejected request gets `429 API rate limit exceeded` and nothing else
//!    runs. If the counter store fails, the request is admitted.
//! 3. **Authentication**: protected, non-public paths need a resolved user
//!    id; without one the caller is redirected (`302`) to the sign-in page.
//!    An identity provider failure yields a bare `500`.
//! 4. **Pass-through** to the inner service.
//!
//! ```text
//! Request → headers → rate limit (/api) → auth (protected) → handler
//!                         ↓                    ↓
//!                    429 + X-RateLimit-*   302 Location: /sign-in
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::LOCATION;
use axum::http::{HeaderValue, Request, Response, StatusCode};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::{debug, error, warn};

use super::ip::extract_client_ip;
use super::rate_limit::{RATE_LIMIT_EXCEEDED_BODY, RateLimitDecision, SlidingWindowLimiter};
use super::request_id::RequestId;
use super::route_match::{RouteMatcher, is_api_path};
use super::security_headers::SecurityHeaders;
use crate::error::{AppError, AppResult};
use crate::identity::IdentityProvider;
use crate::metrics;
use crate::state::AppState;

#[derive(Debug)]
struct GateConfig {
    security_headers: SecurityHeaders,
    limiter: Option<SlidingWindowLimiter>,
    identity: Arc<dyn IdentityProvider>,
    routes: RouteMatcher,
    sign_in_location: HeaderValue,
}

impl GateConfig {
    /// Stamp security headers, plus rate-limit headers when a decision was made.
    fn finish(&self, mut response: Response<Body>, decision: Option<&RateLimitDecision>) -> Response<Body> {
        if let Some(decision) = decision {
            decision.apply_headers(response.headers_mut());
        }
        self.security_headers.apply(response.headers_mut());
        response
    }

    fn rate_limited(&self, decision: &RateLimitDecision) -> Response<Body> {
        let response = (StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_EXCEEDED_BODY).into_response();
        self.finish(response, Some(decision))
    }

    fn redirect_to_sign_in(&self, decision: Option<&RateLimitDecision>) -> Response<Body> {
        let mut response = StatusCode::FOUND.into_response();
        response
            .headers_mut()
            .insert(LOCATION, self.sign_in_location.clone());
        self.finish(response, decision)
    }

    fn internal_error(&self, decision: Option<&RateLimitDecision>) -> Response<Body> {
        self.finish(StatusCode::INTERNAL_SERVER_ERROR.into_response(), decision)
    }
}

/// Tower layer installing the edge request gate.
#[derive(Debug, Clone)]
pub struct EdgeGateLayer {
    config: Arc<GateConfig>,
}

impl EdgeGateLayer {
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if `sign_in_url` is not a valid header value.
    pub fn new(
        security_headers: SecurityHeaders,
        limiter: Option<SlidingWindowLimiter>,
        identity: Arc<dyn IdentityProvider>,
        sign_in_url: &str,
    ) -> AppResult<Self> {
        let sign_in_location = HeaderValue::from_str(sign_in_url).map_err(|e| {
            AppError::ConfigError(format!("sign-in URL is not a valid header value: {e}"))
        })?;

        Ok(Self {
            config: Arc::new(GateConfig {
                security_headers,
                limiter,
                identity,
                routes: RouteMatcher::default(),
                sign_in_location,
            }),
        })
    }

    /// Gate wired to the application's limiter, identity provider and settings.
    pub fn from_state(state: &AppState) -> AppResult<Self> {
        Self::new(
            SecurityHeaders::new(state.config.environment)?,
            state.limiter.clone(),
            state.identity.clone(),
            &state.config.sign_in_url,
        )
    }

    pub fn rate_limiting_enabled(&self) -> bool {
        self.config.limiter.is_some()
    }
}

impl<S> Layer<S> for EdgeGateLayer {
    type Service = EdgeGateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        EdgeGateService {
            inner,
            config: self.config.clone(),
        }
    }
}

/// Edge gate service wrapper.
#[derive(Debug, Clone)]
pub struct EdgeGateService<S> {
    inner: S,
    config: Arc<GateConfig>,
}

impl<S> Service<Request<Body>> for EdgeGateService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let gate = self.config.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let path = req.uri().path().to_owned();
            let request_id = req
                .extensions()
                .get::<RequestId>()
                .map(|id| id.as_str().to_owned())
                .unwrap_or_default();
            let mut decision = None;

            if is_api_path(&path)
                && let Some(limiter) = &gate.limiter
            {
                let client_ip = extract_client_ip(req.headers());
                match limiter.limit(&client_ip).await {
                    Ok(d) if d.success => {
                        metrics::record_rate_limit_decision("admitted");
                        decision = Some(d);
                    }
                    Ok(d) => {
                        metrics::record_rate_limit_decision("rejected");
                        warn!(
                            request_id = %request_id,
                            client_ip = %client_ip,
                            path = %path,
                            category = "security",
                            "API rate limit exceeded"
                        );
                        return Ok(gate.rate_limited(&d));
                    }
                    Err(e) => {
                        metrics::record_rate_limit_decision("store_error");
                        warn!(
                            request_id = %request_id,
                            client_ip = %client_ip,
                            error = %e,
                            category = "security",
                            "Rate limit store unavailable, admitting request"
                        );
                    }
                }
            }

            if gate.routes.requires_auth(&path) {
                match gate.identity.resolve_user_id(req.headers()).await {
                    Ok(Some(user_id)) => {
                        debug!(user_id = %user_id, path = %path, "Authenticated request");
                    }
                    Ok(None) => {
                        metrics::record_auth_redirect();
                        debug!(path = %path, category = "authentication", "Redirecting to sign-in");
                        return Ok(gate.redirect_to_sign_in(decision.as_ref()));
                    }
                    Err(e) => {
                        metrics::record_auth_error();
                        error!(
                            request_id = %request_id,
                            path = %path,
                            error = %e,
                            category = "authentication",
                            "Identity resolution failed"
                        );
                        return Ok(gate.internal_error(decision.as_ref()));
                    }
                }
            }

            let response = inner.call(req).await?;
            Ok(gate.finish(response, decision.as_ref()))
        })
    }
}
