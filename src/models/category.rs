//! Category model

use serde::{Deserialize, Serialize};

/// A post category. Users subscribe to categories to receive news
/// notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier
    pub id: i64,
    /// Category name (unique)
    pub name: String,
}
