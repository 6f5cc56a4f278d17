//! Event-driven side effects
//!
//! This module reacts to entity lifecycle events with post-commit side
//! effects. The pieces:
//!
//! - [`Event`] - typed lifecycle event payloads
//! - [`TxScope`] - the transaction boundary: deferred actions registered
//!   here run exactly once after commit, never after rollback
//! - [`EventBus`] - explicit (entity kind, transition) -> handler table,
//!   built once at process start
//! - [`Notifier`] - the handlers: account provisioning, notification
//!   fan-out, and cache invalidation
//!
//! Error policy: no handler or deferred-action failure ever propagates to
//! the caller. A side-effect failure degrades to "the notification or cache
//! effect did not happen", never to "the write failed".

pub mod bus;
pub mod event;
pub mod notifier;
pub mod scope;


pub use bus::{EventBus, EventHandler};
pub use event::{EntityKind, Event, Transition};
pub use notifier::{build_bus, Notifier};
pub use scope::TxScope;
