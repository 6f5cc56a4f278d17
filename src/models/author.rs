//! Author profile model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author profile, created reactively 1:1 with a User.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorProfile {
    /// Unique identifier
    pub id: i64,
    /// Owning user (unique)
    pub user_id: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}
