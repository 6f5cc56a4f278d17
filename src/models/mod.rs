//! Data models
//!
//! This module contains all data structures used throughout the Newswire
//! notification engine. Models represent database entities owned by the
//! publishing backend: users, author profiles, activation tokens, posts,
//! categories, subscriptions, comments and role groups.

mod activation_token;
mod author;
mod category;
mod comment;
mod group;
mod post;
mod subscription;
mod user;

pub use activation_token::{ActivationToken, TOKEN_RETENTION_DAYS};
pub use author::AuthorProfile;
pub use category::Category;
pub use comment::Comment;
pub use group::{Group, AUTHORS_GROUP, COMMON_GROUP};
pub use post::{CreatePostInput, Post, PostKind};
pub use subscription::Subscription;
pub use user::User;
