//! Subscription model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's subscription to a category. The (user, category) pair is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Unique identifier
    pub id: i64,
    /// Subscribing user
    pub user_id: i64,
    /// Subscribed category
    pub category_id: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}
