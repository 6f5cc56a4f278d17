//! Post model
//!
//! Posts come in two kinds, news and articles, which use different
//! notification delivery paths. The kind is a tagged enum rather than a
//! free-form string so that dispatch is exhaustive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A published post (news item or article).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Unique identifier
    pub id: i64,
    /// Post title
    pub title: String,
    /// Post body
    pub body: String,
    /// News or article; selects the notification delivery path
    pub kind: PostKind,
    /// Authoring user
    pub author_id: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Post kind.
///
/// - News: notifications fan out to category subscribers
/// - Article: notifications go through the immediate article path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    /// News item
    News,
    /// Long-form article
    Article,
}

impl fmt::Display for PostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostKind::News => write!(f, "news"),
            PostKind::Article => write!(f, "article"),
        }
    }
}

impl FromStr for PostKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "news" => Ok(PostKind::News),
            "article" => Ok(PostKind::Article),
            _ => Err(anyhow::anyhow!("Invalid post kind: {}", s)),
        }
    }
}

/// Input for creating a new post.
#[derive(Debug, Clone)]
pub struct CreatePostInput {
    /// Post title
    pub title: String,
    /// Post body
    pub body: String,
    /// News or article
    pub kind: PostKind,
    /// Authoring user
    pub author_id: i64,
}
