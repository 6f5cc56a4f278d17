//! Role group model
//!
//! Groups are the role store: membership in `common` marks a provisioned
//! account, membership in `authors` is granted on account activation.

use serde::{Deserialize, Serialize};

/// Group every provisioned (non-staff) user joins on registration.
pub const COMMON_GROUP: &str = "common";

/// Group granted when an account is activated.
pub const AUTHORS_GROUP: &str = "authors";

/// A role group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Unique identifier
    pub id: i64,
    /// Group name (unique)
    pub name: String,
}
