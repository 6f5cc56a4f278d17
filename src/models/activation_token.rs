//! Activation token model
//!
//! Tokens are activated at most once: the `unactivated -> activated`
//! transition is terminal, and only that edge triggers notification side
//! effects. Unactivated tokens are swept after a retention window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default retention window for unactivated tokens, in days.
pub const TOKEN_RETENTION_DAYS: i64 = 7;

/// Account activation token, 1:1 with a User until activated or swept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationToken {
    /// Unique identifier
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Opaque token value embedded in the activation URL
    pub token: String,
    /// Whether the account has been activated
    pub activated: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl ActivationToken {
    /// Generate a fresh token value for the activation URL.
    pub fn generate_value() -> String {
        Uuid::new_v4().to_string()
    }

    /// Whether this token is past the retention window and still unactivated.
    pub fn is_expired(&self, now: DateTime<Utc>, retention_days: i64) -> bool {
        !self.activated && self.created_at < now - Duration::days(retention_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(activated: bool, age_days: i64) -> ActivationToken {
        ActivationToken {
            id: 1,
            user_id: 1,
            token: ActivationToken::generate_value(),
            activated,
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    #[test]
    fn test_generate_value_is_unique() {
        assert_ne!(
            ActivationToken::generate_value(),
            ActivationToken::generate_value()
        );
    }

    #[test]
    fn test_is_expired_unactivated_past_window() {
        assert!(token(false, 8).is_expired(Utc::now(), TOKEN_RETENTION_DAYS));
    }

    #[test]
    fn test_is_expired_unactivated_within_window() {
        assert!(!token(false, 3).is_expired(Utc::now(), TOKEN_RETENTION_DAYS));
    }

    #[test]
    fn test_is_expired_activated_never_expires() {
        assert!(!token(true, 10).is_expired(Utc::now(), TOKEN_RETENTION_DAYS));
    }
}
