use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use super::ProfileSync;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::identity::IdentityProvider;
use crate::metrics;

/// Token lifetime, in seconds.
pub const TOKEN_TTL_SECS: i64 = 60 * 60;

/// `iat` is backdated by this much to absorb clock skew with the video backend.
pub const ISSUED_AT_SKEW_SECS: i64 = 60;

/// Claims of a video SDK user token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamClaims {
    pub user_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// A minted token and its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs HS256 user tokens with the video backend's API secret.
#[derive(Debug, Clone)]
pub struct StreamTokenSigner {
    api_key: String,
    secret: SecretString,
}

impl StreamTokenSigner {
    pub fn new(api_key: impl Into<String>, secret: SecretString) -> Self {
        Self {
            api_key: api_key.into(),
            secret,
        }
    }

    /// Signer from configuration, or `None` if the key or secret is empty.
    pub fn from_config(config: &Config) -> Option<Self> {
        if config.stream_api_key.is_empty() || config.stream_secret_key.expose_secret().is_empty() {
            return None;
        }
        Some(Self::new(
            config.stream_api_key.clone(),
            config.stream_secret_key.clone(),
        ))
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn issue(&self, user_id: &str) -> AppResult<IssuedToken> {
        self.issue_at(user_id, Utc::now())
    }

    /// Sign a token for `user_id` as of `now`.
    pub fn issue_at(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<IssuedToken> {
        let now_secs = now.timestamp();
        let claims = StreamClaims {
            user_id: user_id.to_string(),
            iat: now_secs - ISSUED_AT_SKEW_SECS,
            exp: now_secs + TOKEN_TTL_SECS,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.expose_secret().as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))?;

        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AppError::Internal("token expiry out of range".to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }
}

/// Mints video SDK credentials for the signed-in caller.
#[derive(Debug, Clone)]
pub struct TokenService {
    identity: Arc<dyn IdentityProvider>,
    profiles: ProfileSync,
    signer: Option<StreamTokenSigner>,
}

impl TokenService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: ProfileSync,
        signer: Option<StreamTokenSigner>,
    ) -> Self {
        Self {
            identity,
            profiles,
            signer,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.signer.is_some()
    }

    /// Resolve the caller, sync their profile (best effort) and sign a token.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` if the request carries no valid session
    /// - `Misconfigured` if the video API key or secret is missing
    /// - `Identity` if the identity provider cannot be reached
    /// - `Internal` if signing fails
    #[instrument(skip_all)]
    pub async fn issue_token(&self, headers: &HeaderMap) -> AppResult<IssuedToken> {
        let Some(user) = self.identity.current_user(headers).await? else {
            warn!(
                category = "authentication",
                error = "No user found",
                "Token request failed - no user"
            );
            return Err(AppError::Unauthenticated);
        };

        let Some(signer) = &self.signer else {
            error!(category = "api", "Stream configuration missing");
            return Err(AppError::Misconfigured(
                "Stream configuration is incomplete".to_string(),
            ));
        };

        self.profiles.sync(&user).await;

        match signer.issue(&user.id) {
            Ok(issued) => {
                metrics::record_token_issued("success");
                info!(
                    user_id = %user.id,
                    expires_at = %issued.expires_at.to_rfc3339(),
                    category = "authentication",
                    "Stream token generated successfully"
                );
                Ok(issued)
            }
            Err(e) => {
                metrics::record_token_issued("failure");
                error!(user_id = %user.id, error = %e, "Failed to generate Stream token");
                Err(e)
            }
        }
    }
}
