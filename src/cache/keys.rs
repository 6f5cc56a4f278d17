//! Deterministic cache-key templates
//!
//! Every cache key is built here so that invalidation and population can
//! never drift apart. Keys are derived from entity identities only.

/// Latest news listing
pub const LATEST_NEWS: &str = "latest_news";

/// Full news listing
pub const NEWS_LIST: &str = "news_list";

/// Category listing
pub const CATEGORIES_LIST: &str = "categories_list";

/// A single post
pub fn post(post_id: i64) -> String {
    format!("post_{}", post_id)
}

/// Comments on a post
pub fn post_comments(post_id: i64) -> String {
    format!("post_{}_comments", post_id)
}

/// Comment count of a post
pub fn post_comments_count(post_id: i64) -> String {
    format!("post_{}_comments_count", post_id)
}

/// A user's subscription list
pub fn user_subscriptions(user_id: i64) -> String {
    format!("user_{}_subscriptions", user_id)
}

/// Subscriber count of a category
pub fn category_subscribers_count(category_id: i64) -> String {
    format!("category_{}_subscribers_count", category_id)
}
