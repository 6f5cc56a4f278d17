//! Activation token retention
//!
//! Periodic sweep that deletes unactivated tokens older than the
//! configured retention window. Activated tokens are kept as the record
//! of when the account was confirmed.

use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::db::repositories::ActivationTokenRepository;

/// Expired token sweeper.
pub struct RetentionService {
    tokens: Arc<dyn ActivationTokenRepository>,
    retention_days: i64,
}

impl RetentionService {
    pub fn new(tokens: Arc<dyn ActivationTokenRepository>, retention_days: i64) -> Self {
        Self {
            tokens,
            retention_days,
        }
    }

    /// Delete unactivated tokens past the retention window. Returns the
    /// number of tokens removed. A failing store is logged and counted as
    /// zero removals so the sweep loop keeps running.
    pub async fn run_sweep(&self) -> u64 {
        let cutoff = Utc::now() - Duration::days(self.retention_days);
        let deleted = match self.tokens.delete_expired(cutoff).await {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::error!("Retention sweep failed: {:#}", e);
                return 0;
            }
        };

        if deleted > 0 {
            tracing::info!(
                "Retention sweep removed {} expired activation token(s)",
                deleted
            );
        } else {
            tracing::debug!("Retention sweep found no expired activation tokens");
        }

        deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxActivationTokenRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{ActivationToken, User};
    use sqlx::SqlitePool;

    async fn setup() -> (SqlitePool, RetentionService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let service = RetentionService::new(SqlxActivationTokenRepository::boxed(pool.clone()), 7);
        (pool, service)
    }

    async fn create_user(pool: &SqlitePool, name: &str) -> i64 {
        SqlxUserRepository::new(pool.clone())
            .create(&User::new(name.to_string(), format!("{}@example.com", name), false))
            .await
            .expect("create user")
            .id
    }

    async fn backdate(pool: &SqlitePool, token_id: i64, days: i64) {
        let created = Utc::now() - Duration::days(days);
        sqlx::query("UPDATE activation_tokens SET created_at = ? WHERE id = ?")
            .bind(created)
            .bind(token_id)
            .execute(pool)
            .await
            .expect("backdate token");
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_unactivated() {
        let (pool, service) = setup().await;
        let tokens = SqlxActivationTokenRepository::new(pool.clone());

        let fresh = tokens
            .create_for_user(create_user(&pool, "fresh").await, false)
            .await
            .expect("token");
        backdate(&pool, fresh.id, 3).await;

        let stale = tokens
            .create_for_user(create_user(&pool, "stale").await, false)
            .await
            .expect("token");
        backdate(&pool, stale.id, 10).await;

        let stale_activated = tokens
            .create_for_user(create_user(&pool, "done").await, true)
            .await
            .expect("token");
        backdate(&pool, stale_activated.id, 10).await;

        assert_eq!(service.run_sweep().await, 1);

        assert!(tokens.get_by_token(&fresh.token).await.expect("get").is_some());
        assert!(tokens.get_by_token(&stale.token).await.expect("get").is_none());
        assert!(tokens
            .get_by_token(&stale_activated.token)
            .await
            .expect("get")
            .is_some());
    }

    #[tokio::test]
    async fn test_sweep_on_empty_table() {
        let (_pool, service) = setup().await;
        assert_eq!(service.run_sweep().await, 0);
    }

    struct FailingTokenRepository;

    #[async_trait::async_trait]
    impl ActivationTokenRepository for FailingTokenRepository {
        async fn create_for_user(
            &self,
            _user_id: i64,
            _activated: bool,
        ) -> anyhow::Result<ActivationToken> {
            anyhow::bail!("store unavailable")
        }

        async fn get_by_token(&self, _token: &str) -> anyhow::Result<Option<ActivationToken>> {
            anyhow::bail!("store unavailable")
        }

        async fn get_by_user(&self, _user_id: i64) -> anyhow::Result<Option<ActivationToken>> {
            anyhow::bail!("store unavailable")
        }

        async fn activate(&self, _token: &str) -> anyhow::Result<Option<ActivationToken>> {
            anyhow::bail!("store unavailable")
        }

        async fn delete_expired(&self, _cutoff: chrono::DateTime<Utc>) -> anyhow::Result<u64> {
            anyhow::bail!("store unavailable")
        }
    }

    #[tokio::test]
    async fn test_sweep_reports_zero_when_store_fails() {
        let service = RetentionService::new(Arc::new(FailingTokenRepository), 7);
        assert_eq!(service.run_sweep().await, 0);
    }
}
