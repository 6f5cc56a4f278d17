//! Database layer
//!
//! SQLite-backed persistence for the Newswire notification engine.
//! Migrations are embedded in the binary; data access goes through
//! trait-based repositories so the event handlers and services can be
//! tested against an in-memory database.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool};
