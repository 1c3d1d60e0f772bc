//! Clerk identity provider client.
//!
//! Session tokens are RS256 JWTs. They are verified locally against either
//! the PEM key configured as `CLERK_JWT_KEY` (networkless) or the instance
//! JWKS, fetched from `GET /v1/jwks` on first use and refetched when a token
//! names an unknown `kid` (key rotation). Refetches happen at most once per
//! [`JWKS_REFRESH_COOLDOWN`]; concurrent misses wait on the same fetch, and a
//! miss inside the cooldown is treated as an unknown key. Profiles come from
//! `GET /v1/users/{id}` on the Backend API, authenticated with the secret key.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{ExternalUser, IdentityError, IdentityProvider, session_token};

/// Allowed clock skew when checking `exp`/`nbf`, in seconds.
const CLOCK_SKEW_SECS: u64 = 5;

/// Minimum time between two JWKS fetches.
pub const JWKS_REFRESH_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct JwksCache {
    keys: Option<JwkSet>,
    /// Last fetch attempt, successful or not.
    fetched_at: Option<Instant>,
}

impl JwksCache {
    fn decoding_key(&self, kid: &str) -> Result<Option<DecodingKey>, IdentityError> {
        let Some(jwk) = self.keys.as_ref().and_then(|set| set.find(kid)) else {
            return Ok(None);
        };
        DecodingKey::from_jwk(jwk)
            .map(Some)
            .map_err(|e| IdentityError::Keys(format!("kid {kid}: {e}")))
    }

    fn cooling_down(&self, cooldown: Duration) -> bool {
        self.fetched_at.is_some_and(|at| at.elapsed() < cooldown)
    }
}

/// Claims read from a Clerk session token.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionClaims {
    /// User id.
    pub sub: String,
    /// Session id.
    #[serde(default)]
    pub sid: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

/// Connection settings for [`ClerkClient`].
#[derive(Debug, Clone)]
pub struct ClerkSettings {
    pub api_url: String,
    pub secret_key: SecretString,
    /// PEM public key; when `None` the JWKS endpoint is used.
    pub jwt_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClerkVerification {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClerkEmailAddress {
    id: String,
    email_address: String,
    #[serde(default)]
    verification: Option<ClerkVerification>,
}

/// Subset of the Backend API user object.
#[derive(Debug, Deserialize)]
struct ClerkUser {
    id: String,
    first_name: Option<String>,
    last_name: Option<String>,
    username: Option<String>,
    image_url: Option<String>,
    primary_email_address_id: Option<String>,
    #[serde(default)]
    email_addresses: Vec<ClerkEmailAddress>,
}

impl From<ClerkUser> for ExternalUser {
    fn from(user: ClerkUser) -> Self {
        let primary = user
            .email_addresses
            .iter()
            .find(|e| Some(&e.id) == user.primary_email_address_id.as_ref())
            .or_else(|| user.email_addresses.first());

        let email_verified = primary
            .and_then(|e| e.verification.as_ref())
            .and_then(|v| v.status.as_deref())
            == Some("verified");

        ExternalUser {
            email: primary.map(|e| e.email_address.clone()),
            email_verified,
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            username: user.username,
            image_url: user.image_url,
        }
    }
}

/// Verifies Clerk session tokens and looks up users.
#[derive(Clone)]
pub struct ClerkClient {
    http: Client,
    api_url: String,
    secret_key: SecretString,
    static_key: Option<DecodingKey>,
    jwks: Arc<RwLock<JwksCache>>,
    refresh_cooldown: Duration,
}

impl fmt::Debug for ClerkClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClerkClient")
            .field("api_url", &self.api_url)
            .field("networkless", &self.static_key.is_some())
            .finish_non_exhaustive()
    }
}

impl ClerkClient {
    /// # Errors
    ///
    /// Returns `IdentityError::Keys` if the configured PEM key cannot be parsed.
    pub fn new(http: Client, settings: ClerkSettings) -> Result<Self, IdentityError> {
        let static_key = settings
            .jwt_key
            .as_deref()
            .map(|pem| {
                DecodingKey::from_rsa_pem(pem.as_bytes())
                    .map_err(|e| IdentityError::Keys(format!("CLERK_JWT_KEY: {e}")))
            })
            .transpose()?;

        Ok(Self {
            http,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            secret_key: settings.secret_key,
            static_key,
            jwks: Arc::new(RwLock::new(JwksCache::default())),
            refresh_cooldown: JWKS_REFRESH_COOLDOWN,
        })
    }

    /// Override the minimum time between JWKS fetches.
    pub fn with_jwks_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, IdentityError> {
        let response = self
            .http
            .get(format!("{}{path}", self.api_url))
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(IdentityError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| IdentityError::Transport(e.to_string()))
    }

    async fn fetch_jwks(&self) -> Result<JwkSet, IdentityError> {
        let set: JwkSet = self
            .get_json("/v1/jwks")
            .await?
            .ok_or_else(|| IdentityError::Keys("JWKS endpoint not found".to_string()))?;
        info!(keys = set.keys.len(), "Fetched identity provider JWKS");
        Ok(set)
    }

    /// Decoding key for a token's `kid`, refreshing the JWKS on a miss
    /// unless a fetch was attempted within the cooldown.
    async fn key_for(&self, kid: Option<&str>) -> Result<Option<DecodingKey>, IdentityError> {
        if let Some(key) = &self.static_key {
            return Ok(Some(key.clone()));
        }
        let Some(kid) = kid else {
            return Ok(None);
        };

        if let Some(key) = self.jwks.read().await.decoding_key(kid)? {
            return Ok(Some(key));
        }

        // Holding the write lock across the fetch merges concurrent misses
        let mut cache = self.jwks.write().await;
        if let Some(key) = cache.decoding_key(kid)? {
            return Ok(Some(key));
        }
        if cache.cooling_down(self.refresh_cooldown) {
            debug!(kid, category = "security", "JWKS refresh suppressed");
            return Ok(None);
        }

        cache.fetched_at = Some(Instant::now());
        cache.keys = Some(self.fetch_jwks().await?);
        cache.decoding_key(kid)
    }

    /// Verify a session token.
    ///
    /// Returns `Ok(None)` for malformed, expired or unknown-key tokens.
    pub async fn verify_session(&self, token: &str) -> Result<Option<SessionClaims>, IdentityError> {
        let header = match decode_header(token) {
            Ok(header) => header,
            Err(e) => {
                debug!(error = %e, category = "authentication", "Malformed session token");
                return Ok(None);
            }
        };

        let Some(key) = self.key_for(header.kid.as_deref()).await? else {
            warn!(kid = ?header.kid, category = "security", "Session token signed with unknown key");
            return Ok(None);
        };

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = CLOCK_SKEW_SECS;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        match decode::<SessionClaims>(token, &key, &validation) {
            Ok(data) => Ok(Some(data.claims)),
            Err(e) => {
                debug!(error = %e, category = "authentication", "Session token rejected");
                Ok(None)
            }
        }
    }

    /// Backend API user lookup. `Ok(None)` when the user no longer exists.
    pub async fn fetch_user(&self, user_id: &str) -> Result<Option<ExternalUser>, IdentityError> {
        let user: Option<ClerkUser> = self.get_json(&format!("/v1/users/{user_id}")).await?;
        Ok(user.map(ExternalUser::from))
    }
}

#[async_trait]
impl IdentityProvider for ClerkClient {
    async fn resolve_user_id(&self, headers: &HeaderMap) -> Result<Option<String>, IdentityError> {
        let Some(token) = session_token(headers) else {
            return Ok(None);
        };
        Ok(self.verify_session(&token).await?.map(|claims| claims.sub))
    }

    async fn current_user(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<ExternalUser>, IdentityError> {
        let Some(user_id) = self.resolve_user_id(headers).await? else {
            return Ok(None);
        };
        self.fetch_user(&user_id).await
    }
}
