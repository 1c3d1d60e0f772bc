//! Identity provider seam.
//!
//! The gate needs a cheap "who is calling" answer per request
//! ([`IdentityProvider::resolve_user_id`]); the token provider needs the full
//! profile ([`IdentityProvider::current_user`]). Both read the caller's
//! session credential from the request headers:
//!
//! 1. `Authorization: Bearer <token>`
//! 2. `__session` cookie
//!
//! An absent, malformed or expired credential is **not** an error: it
//! resolves to `Ok(None)`. Errors are reserved for the provider being
//! unreachable or answering unexpectedly.

use std::fmt;

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};
use thiserror::Error;

use crate::error::AppError;

mod clerk;

pub use clerk::{ClerkClient, ClerkSettings, JWKS_REFRESH_COOLDOWN, SessionClaims};

/// Cookie carrying the session JWT.
pub const SESSION_COOKIE: &str = "__session";

/// Caller profile as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExternalUser {
    /// Stable external identifier.
    pub id: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity provider request failed: {0}")]
    Transport(String),

    #[error("identity provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("signing keys unavailable: {0}")]
    Keys(String),
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        AppError::Identity(err.to_string())
    }
}

/// Per-request identity resolution.
#[async_trait]
pub trait IdentityProvider: Send + Sync + fmt::Debug {
    /// Authenticated user id for this request, if any.
    async fn resolve_user_id(&self, headers: &HeaderMap) -> Result<Option<String>, IdentityError>;

    /// Full profile of the authenticated caller, if any.
    async fn current_user(&self, headers: &HeaderMap)
    -> Result<Option<ExternalUser>, IdentityError>;
}

/// Extract the session credential from the request headers.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(AUTHORIZATION)
        && let Ok(value) = value.to_str()
        && let Some(token) = value.strip_prefix("Bearer ")
        && !token.trim().is_empty()
    {
        return Some(token.trim().to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
