//! Local user profile datastore.
//!
//! The identity provider is the source of truth for users; this table keeps
//! a local copy keyed by the provider's user id (`clerk_id`) so the rest of
//! the application can join against it.
//!
//! # Error Handling
//!
//! All repository methods return [`AppResult`]; query failures surface as
//! `AppError::Database`. Callers on the token path treat them as best effort.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::identity::ExternalUser;

mod memory;
mod postgres;

pub use memory::MemoryUserRepository;
pub use postgres::PgUserRepository;

/// Maximum pooled connections.
pub const DEFAULT_POOL_MAX: u32 = 10;

/// Time to wait for a pooled connection.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// A row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub clerk_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub image_url: Option<String>,
    pub email_verified: bool,
    pub last_active_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values for a first-time insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub clerk_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub image_url: Option<String>,
    pub email_verified: bool,
}

impl From<&ExternalUser> for NewUser {
    fn from(user: &ExternalUser) -> Self {
        Self {
            clerk_id: user.id.clone(),
            email: user.email.clone().unwrap_or_default(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
            image_url: user.image_url.clone(),
            email_verified: user.email_verified,
        }
    }
}

/// Fields rewritten when the provider's profile has drifted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserChanges {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
    pub email_verified: bool,
}

/// Persistence for local user profiles.
#[async_trait]
pub trait UserRepository: Send + Sync + fmt::Debug {
    async fn find_by_clerk_id(&self, clerk_id: &str) -> AppResult<Option<UserProfile>>;

    /// Insert a profile. Returns `false` if a row for the same `clerk_id`
    /// already existed (a concurrent insert won the race).
    async fn insert(&self, user: &NewUser) -> AppResult<bool>;

    /// Apply `changes` and refresh `last_active_at`.
    async fn update(&self, clerk_id: &str, changes: &UserChanges) -> AppResult<()>;

    /// Refresh `last_active_at` only.
    async fn touch_last_active(&self, clerk_id: &str) -> AppResult<()>;

    /// Cheap liveness probe (`SELECT 1`).
    async fn ping(&self) -> AppResult<()>;
}

/// Open the connection pool and apply pending migrations.
pub async fn connect(database_url: &SecretString) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(DEFAULT_POOL_MAX)
        .acquire_timeout(DEFAULT_ACQUIRE_TIMEOUT)
        .connect(database_url.expose_secret())
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| AppError::Internal(format!("database migration failed: {e}")))?;

    info!(category = "database", "Database pool ready, migrations applied");
    Ok(pool)
}
