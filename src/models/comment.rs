//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A comment on a post. Comment creation only triggers cache invalidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// Unique identifier
    pub id: i64,
    /// Parent post
    pub post_id: i64,
    /// Commenting user
    pub user_id: i64,
    /// Comment body
    pub body: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}
