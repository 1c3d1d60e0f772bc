use async_trait::async_trait;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use super::{NewUser, UserChanges, UserProfile, UserRepository};
use crate::error::AppResult;

const SELECT_COLUMNS: &str = "id, clerk_id, email, first_name, last_name, username, image_url, \
     email_verified, last_active_at, created_at, updated_at";

/// PostgreSQL-backed [`UserRepository`].
#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_clerk_id(&self, clerk_id: &str) -> AppResult<Option<UserProfile>> {
        let user = sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {SELECT_COLUMNS} FROM users WHERE clerk_id = $1"
        ))
        .bind(clerk_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert(&self, user: &NewUser) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, clerk_id, email, first_name, last_name, username,
                               image_url, email_verified)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (clerk_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.clerk_id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.username)
        .bind(&user.image_url)
        .bind(user.email_verified)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update(&self, clerk_id: &str, changes: &UserChanges) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET email = $2,
                   first_name = $3,
                   last_name = $4,
                   image_url = $5,
                   email_verified = $6,
                   last_active_at = now(),
                   updated_at = now()
             WHERE clerk_id = $1
            "#,
        )
        .bind(clerk_id)
        .bind(&changes.email)
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(&changes.image_url)
        .bind(changes.email_verified)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn touch_last_active(&self, clerk_id: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_active_at = now(), updated_at = now() WHERE clerk_id = $1")
            .bind(clerk_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
