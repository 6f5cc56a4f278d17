//! Activation token repository
//!
//! The `activate` operation is the single place where the
//! `unactivated -> activated` edge is detected: the UPDATE is guarded by
//! `activated = 0`, so callers learn whether the flag actually flipped
//! instead of comparing snapshots.

use crate::models::ActivationToken;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Activation token repository trait
#[async_trait]
pub trait ActivationTokenRepository: Send + Sync {
    /// Create a token for a user, optionally pre-activated (social signup)
    async fn create_for_user(&self, user_id: i64, activated: bool) -> Result<ActivationToken>;

    /// Get token by its value
    async fn get_by_token(&self, token: &str) -> Result<Option<ActivationToken>>;

    /// Get token by owning user
    async fn get_by_user(&self, user_id: i64) -> Result<Option<ActivationToken>>;

    /// Flip the token to activated. Returns the updated token only when the
    /// flag actually flipped; `None` means the token was missing or already
    /// activated.
    async fn activate(&self, token: &str) -> Result<Option<ActivationToken>>;

    /// Delete unactivated tokens created before the cutoff. Returns the
    /// number of rows deleted.
    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// SQLx-based activation token repository implementation
pub struct SqlxActivationTokenRepository {
    pool: SqlitePool,
}

impl SqlxActivationTokenRepository {
    /// Create a new SQLx activation token repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: SqlitePool) -> Arc<dyn ActivationTokenRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ActivationTokenRepository for SqlxActivationTokenRepository {
    async fn create_for_user(&self, user_id: i64, activated: bool) -> Result<ActivationToken> {
        let now = Utc::now();
        let value = ActivationToken::generate_value();

        let result = sqlx::query(
            r#"
            INSERT INTO activation_tokens (user_id, token, activated, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(&value)
        .bind(activated)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create activation token")?;

        Ok(ActivationToken {
            id: result.last_insert_rowid(),
            user_id,
            token: value,
            activated,
            created_at: now,
        })
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<ActivationToken>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, token, activated, created_at
            FROM activation_tokens
            WHERE token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get activation token")?;

        Ok(row.map(|row| row_to_token(&row)))
    }

    async fn get_by_user(&self, user_id: i64) -> Result<Option<ActivationToken>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, token, activated, created_at
            FROM activation_tokens
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get activation token by user")?;

        Ok(row.map(|row| row_to_token(&row)))
    }

    async fn activate(&self, token: &str) -> Result<Option<ActivationToken>> {
        // Guarded update: rows_affected is 0 unless the flag flipped
        let result = sqlx::query(
            "UPDATE activation_tokens SET activated = 1 WHERE token = ? AND activated = 0",
        )
        .bind(token)
        .execute(&self.pool)
        .await
        .context("Failed to activate token")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_token(token).await
    }

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM activation_tokens WHERE activated = 0 AND created_at < ?",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .context("Failed to delete expired tokens")?;

        Ok(result.rows_affected())
    }
}

fn row_to_token(row: &sqlx::sqlite::SqliteRow) -> ActivationToken {
    ActivationToken {
        id: row.get("id"),
        user_id: row.get("user_id"),
        token: row.get("token"),
        activated: row.get("activated"),
        created_at: row.get("created_at"),
    }
}
