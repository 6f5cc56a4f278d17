//! Author profile repository
//!
//! Author profiles are provisioned reactively, so creation goes through
//! `get_or_create` to stay idempotent when the same user-created event is
//! handled more than once.

use crate::models::AuthorProfile;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Author profile repository trait
#[async_trait]
pub trait AuthorRepository: Send + Sync {
    /// Get the profile for a user, creating it if missing.
    /// Returns the profile and whether it was just created.
    async fn get_or_create(&self, user_id: i64) -> Result<(AuthorProfile, bool)>;

    /// Get the profile for a user
    async fn get_by_user(&self, user_id: i64) -> Result<Option<AuthorProfile>>;

    /// Delete a profile
    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based author profile repository implementation
pub struct SqlxAuthorRepository {
    pool: SqlitePool,
}

impl SqlxAuthorRepository {
    /// Create a new SQLx author repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: SqlitePool) -> Arc<dyn AuthorRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AuthorRepository for SqlxAuthorRepository {
    async fn get_or_create(&self, user_id: i64) -> Result<(AuthorProfile, bool)> {
        if let Some(existing) = self.get_by_user(user_id).await? {
            return Ok((existing, false));
        }

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO author_profiles (user_id, created_at) VALUES (?, ?)",
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create author profile")?;

        Ok((
            AuthorProfile {
                id: result.last_insert_rowid(),
                user_id,
                created_at: now,
            },
            true,
        ))
    }

    async fn get_by_user(&self, user_id: i64) -> Result<Option<AuthorProfile>> {
        let row = sqlx::query(
            "SELECT id, user_id, created_at FROM author_profiles WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get author profile")?;

        Ok(row.map(|row| AuthorProfile {
            id: row.get("id"),
            user_id: row.get("user_id"),
            created_at: row.get("created_at"),
        }))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM author_profiles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete author profile")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::User;

    async fn setup() -> (SqlxAuthorRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let user = users
            .create(&User::new("writer".to_string(), "writer@example.com".to_string(), false))
            .await
            .expect("Failed to create user");

        (SqlxAuthorRepository::new(pool), user.id)
    }

    #[tokio::test]
    async fn test_get_or_create_creates_once() {
        let (repo, user_id) = setup().await;

        let (profile, created) = repo.get_or_create(user_id).await.expect("Failed to create");
        assert!(created);
        assert_eq!(profile.user_id, user_id);

        let (again, created_again) = repo.get_or_create(user_id).await.expect("Failed to fetch");
        assert!(!created_again);
        assert_eq!(again.id, profile.id);
    }

    #[tokio::test]
    async fn test_get_by_user_missing() {
        let (repo, _user_id) = setup().await;

        let found = repo.get_by_user(999).await.expect("Failed to query");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_delete_profile() {
        let (repo, user_id) = setup().await;
        let (profile, _) = repo.get_or_create(user_id).await.expect("Failed to create");

        repo.delete(profile.id).await.expect("Failed to delete");

        assert!(repo.get_by_user(user_id).await.expect("query").is_none());
    }
}
