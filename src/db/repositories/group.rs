//! Role group repository
//!
//! The role store: `get_or_create` plus idempotent membership operations.
//! Handlers call these repeatedly, so every write here must tolerate
//! re-application.

use crate::models::Group;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Group repository trait
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Get a group by name, creating it if missing
    async fn get_or_create(&self, name: &str) -> Result<Group>;

    /// Add a user to a group (no-op when already a member)
    async fn add_member(&self, group_id: i64, user_id: i64) -> Result<()>;

    /// Whether a user belongs to the named group
    async fn is_member(&self, name: &str, user_id: i64) -> Result<bool>;

    /// Remove a user from the named group
    async fn remove_member(&self, name: &str, user_id: i64) -> Result<()>;

    /// Email addresses of the named group's members
    async fn member_emails(&self, name: &str) -> Result<Vec<String>>;
}

/// SQLx-based group repository implementation
pub struct SqlxGroupRepository {
    pool: SqlitePool,
}

impl SqlxGroupRepository {
    /// Create a new SQLx group repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: SqlitePool) -> Arc<dyn GroupRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl GroupRepository for SqlxGroupRepository {
    async fn get_or_create(&self, name: &str) -> Result<Group> {
        sqlx::query("INSERT OR IGNORE INTO groups (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await
            .context("Failed to create group")?;

        let row = sqlx::query("SELECT id, name FROM groups WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .context("Failed to get group")?;

        Ok(Group {
            id: row.get("id"),
            name: row.get("name"),
        })
    }

    async fn add_member(&self, group_id: i64, user_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO group_members (group_id, user_id) VALUES (?, ?)")
            .bind(group_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to add group member")?;

        Ok(())
    }

    async fn is_member(&self, name: &str, user_id: i64) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM group_members gm
            JOIN groups g ON g.id = gm.group_id
            WHERE g.name = ? AND gm.user_id = ?
            "#,
        )
        .bind(name)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check group membership")?;

        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    async fn remove_member(&self, name: &str, user_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM group_members
            WHERE user_id = ?
              AND group_id IN (SELECT id FROM groups WHERE name = ?)
            "#,
        )
        .bind(user_id)
        .bind(name)
        .execute(&self.pool)
        .await
        .context("Failed to remove group member")?;

        Ok(())
    }

    async fn member_emails(&self, name: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT u.email
            FROM users u
            JOIN group_members gm ON gm.user_id = u.id
            JOIN groups g ON g.id = gm.group_id
            WHERE g.name = ?
            ORDER BY u.email
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list group member emails")?;

        Ok(rows.iter().map(|row| row.get("email")).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::User;

    async fn setup() -> (SqlxGroupRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let user = users
            .create(&User::new("m".to_string(), "m@example.com".to_string(), false))
            .await
            .expect("Failed to create user");

        (SqlxGroupRepository::new(pool), user.id)
    }

    #[tokio::test]
    async fn test_get_or_create_idempotent() {
        let (repo, _user_id) = setup().await;

        let first = repo.get_or_create("common").await.expect("create");
        let second = repo.get_or_create("common").await.expect("fetch");

        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_membership_roundtrip() {
        let (repo, user_id) = setup().await;
        let group = repo.get_or_create("authors").await.expect("create");

        assert!(!repo.is_member("authors", user_id).await.expect("check"));

        repo.add_member(group.id, user_id).await.expect("add");
        // Re-adding is a no-op
        repo.add_member(group.id, user_id).await.expect("re-add");

        assert!(repo.is_member("authors", user_id).await.expect("check"));

        repo.remove_member("authors", user_id).await.expect("remove");
        assert!(!repo.is_member("authors", user_id).await.expect("check"));
    }

    #[tokio::test]
    async fn test_member_emails_lists_only_members() {
        let (repo, user_id) = setup().await;
        let pool = repo.pool.clone();
        let group = repo.get_or_create("authors").await.expect("create");

        assert!(repo.member_emails("authors").await.expect("list").is_empty());

        repo.add_member(group.id, user_id).await.expect("add");

        let users = SqlxUserRepository::new(pool);
        let other = users
            .create(&User::new("a".to_string(), "a@example.com".to_string(), false))
            .await
            .expect("Failed to create user");
        repo.add_member(group.id, other.id).await.expect("add");

        let emails = repo.member_emails("authors").await.expect("list");
        assert_eq!(emails, vec!["a@example.com", "m@example.com"]);

        // Unknown group resolves to no recipients
        assert!(repo.member_emails("no-such-group").await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_remove_from_missing_group_is_noop() {
        let (repo, user_id) = setup().await;

        repo.remove_member("no-such-group", user_id)
            .await
            .expect("remove should not fail");
    }
}
