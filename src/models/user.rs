//! User model
//!
//! The User entity is owned by the external account system; Newswire only
//! reads and reacts to it. Credentials and authentication live outside this
//! crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user of the publishing backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// Staff accounts are exempt from reactive provisioning
    pub is_staff: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User. The id is assigned by the database on insert.
    pub fn new(username: String, email: String, is_staff: bool) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username,
            email,
            is_staff,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_new() {
        let user = User::new("reader".to_string(), "reader@example.com".to_string(), false);

        assert_eq!(user.id, 0);
        assert_eq!(user.username, "reader");
        assert_eq!(user.email, "reader@example.com");
        assert!(!user.is_staff);
    }
}
