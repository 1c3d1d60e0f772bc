use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::db::{NewUser, UserChanges, UserProfile, UserRepository};
use crate::error::AppResult;
use crate::identity::ExternalUser;
use crate::metrics;

/// How a profile sync was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No local row existed; one was inserted.
    Created,
    /// The provider's profile had drifted; fields were rewritten.
    Updated,
    /// Nothing changed; only `last_active_at` was refreshed.
    Touched,
    /// A concurrent request inserted the row first.
    Raced,
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Touched => "touched",
            Self::Raced => "raced",
        }
    }
}

/// Whether the stored row differs from the provider's profile in any synced field.
pub fn needs_update(stored: &UserProfile, user: &ExternalUser) -> bool {
    stored.email != user.email.as_deref().unwrap_or_default()
        || stored.first_name != user.first_name
        || stored.last_name != user.last_name
        || stored.image_url != user.image_url
}

fn non_empty_or(value: Option<&String>, stored: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).or(stored).cloned()
}

/// Provider values, keeping the stored value wherever the provider's is empty.
pub fn merge_changes(stored: &UserProfile, user: &ExternalUser) -> UserChanges {
    UserChanges {
        email: non_empty_or(user.email.as_ref(), Some(&stored.email)).unwrap_or_default(),
        first_name: non_empty_or(user.first_name.as_ref(), stored.first_name.as_ref()),
        last_name: non_empty_or(user.last_name.as_ref(), stored.last_name.as_ref()),
        image_url: non_empty_or(user.image_url.as_ref(), stored.image_url.as_ref()),
        email_verified: user.email_verified,
    }
}

/// Keeps the local `users` table in step with the identity provider.
#[derive(Debug, Clone)]
pub struct ProfileSync {
    users: Arc<dyn UserRepository>,
}

impl ProfileSync {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Create or refresh the local row for `user`.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn try_sync(&self, user: &ExternalUser) -> AppResult<SyncOutcome> {
        let Some(stored) = self.users.find_by_clerk_id(&user.id).await? else {
            let created = self.users.insert(&NewUser::from(user)).await?;
            if !created {
                return Ok(SyncOutcome::Raced);
            }
            info!(
                user_id = %user.id,
                email = user.email.as_deref().unwrap_or_default(),
                category = "authentication",
                "User created in database"
            );
            return Ok(SyncOutcome::Created);
        };

        if needs_update(&stored, user) {
            self.users
                .update(&user.id, &merge_changes(&stored, user))
                .await?;
            info!(user_id = %user.id, category = "authentication", "User updated in database");
            Ok(SyncOutcome::Updated)
        } else {
            self.users.touch_last_active(&user.id).await?;
            Ok(SyncOutcome::Touched)
        }
    }

    /// Best-effort sync: failures are logged and swallowed.
    pub async fn sync(&self, user: &ExternalUser) -> Option<SyncOutcome> {
        match self.try_sync(user).await {
            Ok(outcome) => {
                metrics::record_profile_sync(outcome.as_str());
                Some(outcome)
            }
            Err(e) => {
                error!(
                    user_id = %user.id,
                    error = %e,
                    category = "database",
                    "Failed to sync user with database"
                );
                metrics::record_profile_sync("failed");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::db::MemoryUserRepository;

    fn ada() -> ExternalUser {
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

    fn sync_with(repo: &MemoryUserRepository) -> ProfileSync {
        ProfileSync::new(Arc::new(repo.clone()))
    }

    #[tokio::test]
    async fn test_first_sync_creates_then_touches() {
        let repo = MemoryUserRepository::new();
        let sync = sync_with(&repo);

        assert_eq!(sync.sync(&ada()).await, Some(SyncOutcome::Created));
        assert_eq!(sync.sync(&ada()).await, Some(SyncOutcome::Touched));

        assert_eq!(repo.insert_count(), 1);
        assert_eq!(repo.update_count(), 0);
        assert_eq!(repo.touch_count(), 1);
    }

    #[tokio::test]
    async fn test_changed_profile_is_updated() {
        let repo = MemoryUserRepository::new();
        let sync = sync_with(&repo);
        sync.sync(&ada()).await;

        let renamed = ExternalUser {
            last_name: Some("King".to_string()),
            ..ada()
        };
        assert_eq!(sync.sync(&renamed).await, Some(SyncOutcome::Updated));

        let stored = repo.find_by_clerk_id("user_ada").await.unwrap().unwrap();
        assert_eq!(stored.last_name.as_deref(), Some("King"));
    }

    #[tokio::test]
    async fn test_empty_provider_values_keep_stored_ones() {
        let repo = MemoryUserRepository::new();
        let sync = sync_with(&repo);
        sync.sync(&ada()).await;

        let sparse = ExternalUser {
            email: None,
            first_name: Some(String::new()),
            image_url: None,
            ..ada()
        };
        assert_eq!(sync.sync(&sparse).await, Some(SyncOutcome::Updated));

        let stored = repo.find_by_clerk_id("user_ada").await.unwrap().unwrap();
        assert_eq!(stored.email, "ada@example.com");
        assert_eq!(stored.first_name.as_deref(), Some("Ada"));
        assert_eq!(
            stored.image_url.as_deref(),
            Some("https://img.example.com/ada.png")
        );
    }

    #[tokio::test]
    async fn test_datastore_failure_is_swallowed() {
        let repo = MemoryUserRepository::new();
        repo.set_unavailable(true);

        assert_eq!(sync_with(&repo).sync(&ada()).await, None);
    }

    #[test]
    fn test_verification_change_alone_does_not_trigger_update() {
        let now = chrono::Utc::now();
        let stored = UserProfile {
            id: uuid::Uuid::new_v4(),
            clerk_id: "user_ada".to_string(),
            email: "ada@example.com".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            username: Some("ada".to_string()),
            image_url: Some("https://img.example.com/ada.png".to_string()),
            email_verified: false,
            last_active_at: now,
            created_at: now,
            updated_at: now,
        };

        assert!(!needs_update(&stored, &ada()));
    }
}
