use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{NewUser, UserChanges, UserProfile, UserRepository};
use crate::error::{AppError, AppResult};

/// In-process [`UserRepository`] for single-node use and tests.
///
/// Counts writes so callers can assert how a sync was resolved, and can be
/// switched to an unavailable state that fails every call.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserRepository {
    users: Arc<RwLock<HashMap<String, UserProfile>>>,
    inserts: Arc<AtomicUsize>,
    updates: Arc<AtomicUsize>,
    touches: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a pool timeout.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn touch_count(&self) -> usize {
        self.touches.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    fn check_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_clerk_id(&self, clerk_id: &str) -> AppResult<Option<UserProfile>> {
        self.check_available()?;
        Ok(self.users.read().await.get(clerk_id).cloned())
    }

    async fn insert(&self, user: &NewUser) -> AppResult<bool> {
        self.check_available()?;
        let mut users = self.users.write().await;
        if users.contains_key(&user.clerk_id) {
            return Ok(false);
        }

        let now = Utc::now();
        users.insert(
            user.clerk_id.clone(),
            UserProfile {
                id: Uuid::new_v4(),
                clerk_id: user.clerk_id.clone(),
                email: user.email.clone(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                username: user.username.clone(),
                image_url: user.image_url.clone(),
                email_verified: user.email_verified,
                last_active_at: now,
                created_at: now,
                updated_at: now,
            },
        );
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn update(&self, clerk_id: &str, changes: &UserChanges) -> AppResult<()> {
        self.check_available()?;
        if let Some(user) = self.users.write().await.get_mut(clerk_id) {
            let now = Utc::now();
            user.email = changes.email.clone();
            user.first_name = changes.first_name.clone();
            user.last_name = changes.last_name.clone();
            user.image_url = changes.image_url.clone();
            user.email_verified = changes.email_verified;
            user.last_active_at = now;
            user.updated_at = now;
            self.updates.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn touch_last_active(&self, clerk_id: &str) -> AppResult<()> {
        self.check_available()?;
        if let Some(user) = self.users.write().await.get_mut(clerk_id) {
            user.last_active_at = Utc::now();
            self.touches.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        self.check_available()
    }
}
