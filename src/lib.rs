//! Newswire - Event-driven notification engine for a news publishing backend
//!
//! Newswire reacts to entity lifecycle events (user registration, post
//! publication, account activation, subscription changes) with post-commit
//! side effects: cache invalidation and email notification fan-out.

pub mod cache;
pub mod config;
pub mod db;
pub mod events;
pub mod models;
pub mod services;
