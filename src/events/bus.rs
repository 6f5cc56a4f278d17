//! Event bus
//!
//! An explicit registration table mapping (entity kind, transition) to
//! handlers, built once at process start. This replaces the scattered
//! global receiver registry the reactive style usually grows: every
//! binding is visible in one place (`notifier::build_bus`).

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::event::{EntityKind, Event, Transition};
use super::scope::TxScope;

/// A reaction to a lifecycle event.
///
/// Handlers evaluate their guard, perform synchronous best-effort work
/// (cache invalidation, provisioning writes), and register deferred
/// actions on the scope for anything that must wait for the commit.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event, scope: &mut TxScope) -> Result<()>;
}

/// Dispatch table from (entity kind, transition) to handlers.
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<(EntityKind, Transition), Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler to an (entity kind, transition) pair.
    pub fn register(
        &mut self,
        kind: EntityKind,
        transition: Transition,
        handler: Arc<dyn EventHandler>,
    ) {
        self.handlers
            .entry((kind, transition))
            .or_default()
            .push(handler);
    }

    /// Total number of handler bindings across all pairs.
    pub fn handler_count(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    /// Whether any handler is bound for the pair.
    pub fn has_handlers(&self, kind: EntityKind, transition: Transition) -> bool {
        self.handlers
            .get(&(kind, transition))
            .map_or(false, |h| !h.is_empty())
    }

    /// Dispatch an event to every matching handler.
    ///
    /// Handler errors are logged with the acting entity's identity and
    /// swallowed; an event with no matching handler is silently ignored.
    pub async fn dispatch(&self, event: &Event, scope: &mut TxScope) {
        let key = (event.kind(), event.transition());

        let Some(handlers) = self.handlers.get(&key) else {
            tracing::debug!("No handler bound for {:?} {:?}", key.0, key.1);
            return;
        };

        for handler in handlers {
            if let Err(e) = handler.handle(event, scope).await {
                tracing::error!(
                    "Handler for {:?} {:?} failed (entity id={}): {:#}",
                    key.0,
                    key.1,
                    event.entity_id(),
                    e
                );
            }
        }
    }
}
