//! Shared fixtures for the router-level integration tests.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, Response};
use secrecy::SecretString;
use tower::ServiceExt;
use uuid::Uuid;

use nexthub_gate::counter_store::{
    CounterStore, CounterStoreError, MemoryCounterStore, SlidingWindow, WindowOutcome,
};
use nexthub_gate::db::MemoryUserRepository;
use nexthub_gate::identity::{ExternalUser, IdentityError, IdentityProvider, session_token};
use nexthub_gate::middleware::SlidingWindowLimiter;
use nexthub_gate::{AppState, Config, build_router};

pub const ADA_TOKEN: &str = "session-ada";
pub const STREAM_SECRET: &str = "stream-secret-for-tests";

pub fn ada() -> ExternalUser {
    ExternalUser {
        id: "user_ada".to_string(),
        email: Some("ada@example.com".to_string()),
        email_verified: true,
        first_name: Some("Ada".to_string()),
        last_name: Some("Lovelace".to_string()),
        username: Some("ada".to_string()),
        image_url: Some("https://img.example.com/ada.png".to_string()),
    }
}

/// Identity provider keyed by session token.
#[derive(Debug, Default)]
pub struct FakeIdentity {
    sessions: HashMap<String, ExternalUser>,
    failing: bool,
    calls: AtomicUsize,
}

impl FakeIdentity {
    pub fn with_ada() -> Self {
        Self::default().with_session(ADA_TOKEN, ada())
    }

    pub fn with_session(mut self, token: &str, user: ExternalUser) -> Self {
        self.sessions.insert(token.to_string(), user);
        self
    }

    /// Every lookup fails as if the provider were unreachable.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, headers: &HeaderMap) -> Result<Option<ExternalUser>, IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(IdentityError::Transport("connection refused".to_string()));
        }
        Ok(session_token(headers).and_then(|token| self.sessions.get(&token).cloned()))
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn resolve_user_id(&self, headers: &HeaderMap) -> Result<Option<String>, IdentityError> {
        Ok(self.lookup(headers)?.map(|user| user.id))
    }

    async fn current_user(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<ExternalUser>, IdentityError> {
        self.lookup(headers)
    }
}

/// Counter store that is always unreachable.
#[derive(Debug)]
pub struct DownCounterStore;

#[async_trait]
impl CounterStore for DownCounterStore {
    async fn hit(
        &self,
        _key: &str,
        _window: SlidingWindow,
        _now_ms: i64,
    ) -> Result<WindowOutcome, CounterStoreError> {
        Err(CounterStoreError::Transport("connection reset".to_string()))
    }
}

/// Static front end with a single `index.html`.
pub fn static_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("nexthub-gate-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("index.html"), "<!doctype html><h1>NextHub</h1>").unwrap();
    dir
}

/// Fully configured settings with a temporary static directory.
pub fn test_config() -> Config {
    Config {
        static_dir: static_dir().to_string_lossy().into_owned(),
        clerk_publishable_key: "pk_test_abc".to_string(),
        clerk_secret_key: SecretString::from("sk_test_abc"),
        stream_api_key: "stream-key".to_string(),
        stream_secret_key: SecretString::from(STREAM_SECRET),
        metrics_port: 0,
        ..Config::default()
    }
}

pub fn memory_limiter() -> SlidingWindowLimiter {
    SlidingWindowLimiter::new(Arc::new(MemoryCounterStore::new()))
}

/// Test application and the collaborators behind it.
pub struct TestApp {
    pub router: Router,
    pub identity: Arc<FakeIdentity>,
    pub users: MemoryUserRepository,
}

impl TestApp {
    pub fn build(
        config: Config,
        identity: FakeIdentity,
        limiter: Option<SlidingWindowLimiter>,
    ) -> Self {
        let identity = Arc::new(identity);
        let users = MemoryUserRepository::new();
        let state = AppState::new(config, identity.clone(), Arc::new(users.clone()), limiter);

        Self {
            router: build_router(state).unwrap(),
            identity,
            users,
        }
    }

    pub fn new(identity: FakeIdentity) -> Self {
        Self::build(test_config(), identity, None)
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, path: &str) -> Response<Body> {
        self.send(Request::get(path).body(Body::empty()).unwrap())
            .await
    }
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Assert the six fixed security headers and the CSP are present.
pub fn assert_security_headers(response: &Response<Body>) {
    let headers = response.headers();
    assert_eq!(headers["x-dns-prefetch-control"], "on");
    assert_eq!(headers["x-xss-protection"], "1; mode=block");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["referrer-policy"], "origin-when-cross-origin");
    assert_eq!(
        headers["permissions-policy"],
        "camera=(self), microphone=(self), geolocation=()"
    );
    let csp = headers["content-security-policy"].to_str().unwrap();
    assert!(csp.contains("frame-ancestors 'none'"), "{csp}");
}
