//! Subscription repository
//!
//! Subscriptions drive the news notification fan-out: `subscribers_of`
//! resolves the recipient users for a category.

use crate::models::{Category, Subscription, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Subscription repository trait
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Create a subscription for a (user, category) pair
    async fn create(&self, user_id: i64, category_id: i64) -> Result<Subscription>;

    /// Delete a subscription; returns it when one existed
    async fn delete(&self, user_id: i64, category_id: i64) -> Result<Option<Subscription>>;

    /// Users subscribed to a category
    async fn subscribers_of(&self, category_id: i64) -> Result<Vec<User>>;

    /// Categories a user is subscribed to
    async fn categories_for(&self, user_id: i64) -> Result<Vec<Category>>;
}

/// SQLx-based subscription repository implementation
pub struct SqlxSubscriptionRepository {
    pool: SqlitePool,
}

impl SqlxSubscriptionRepository {
    /// Create a new SQLx subscription repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: SqlitePool) -> Arc<dyn SubscriptionRepository> {
        Arc::new(Self::new(pool))
    }

    async fn get_pair(&self, user_id: i64, category_id: i64) -> Result<Option<Subscription>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, category_id, created_at
            FROM subscriptions
            WHERE user_id = ? AND category_id = ?
            "#,
        )
        .bind(user_id)
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get subscription")?;

        Ok(row.map(|row| Subscription {
            id: row.get("id"),
            user_id: row.get("user_id"),
            category_id: row.get("category_id"),
            created_at: row.get("created_at"),
        }))
    }
}

#[async_trait]
impl SubscriptionRepository for SqlxSubscriptionRepository {
    async fn create(&self, user_id: i64, category_id: i64) -> Result<Subscription> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO subscriptions (user_id, category_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(category_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create subscription")?;

        Ok(Subscription {
            id: result.last_insert_rowid(),
            user_id,
            category_id,
            created_at: now,
        })
    }

    async fn delete(&self, user_id: i64, category_id: i64) -> Result<Option<Subscription>> {
        let existing = self.get_pair(user_id, category_id).await?;

        if existing.is_some() {
            sqlx::query("DELETE FROM subscriptions WHERE user_id = ? AND category_id = ?")
                .bind(user_id)
                .bind(category_id)
                .execute(&self.pool)
                .await
                .context("Failed to delete subscription")?;
        }

        Ok(existing)
    }

    async fn subscribers_of(&self, category_id: i64) -> Result<Vec<User>> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.username, u.email, u.is_staff, u.created_at, u.updated_at
            FROM users u
            JOIN subscriptions s ON s.user_id = u.id
            WHERE s.category_id = ?
            ORDER BY u.id
            "#,
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to get category subscribers")?;

        Ok(rows
            .iter()
            .map(|row| User {
                id: row.get("id"),
                username: row.get("username"),
                email: row.get("email"),
                is_staff: row.get("is_staff"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            })
            .collect())
    }

    async fn categories_for(&self, user_id: i64) -> Result<Vec<Category>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.name
            FROM categories c
            JOIN subscriptions s ON s.category_id = c.id
            WHERE s.user_id = ?
            ORDER BY c.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to get user subscriptions")?;

        Ok(rows
            .iter()
            .map(|row| Category {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect())
    }
}
