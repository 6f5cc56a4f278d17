//! Transaction scope for post-commit deferral
//!
//! A `TxScope` models the enclosing write transaction's boundary. Handlers
//! register deferred actions on it during event dispatch; the actions run
//! exactly once when the scope commits and never when it rolls back.
//!
//! Deduplication is explicit: one outstanding deferred action per
//! (entity kind, entity id) pair within a scope. The persistence layer's
//! change notifications may fire several times for one logical mutation
//! (e.g. a post insert followed by its category attach), and all of them
//! collapse into a single deferred action.

use futures::future::BoxFuture;
use std::collections::HashSet;
use std::future::Future;

use super::event::EntityKind;

type DeferredFn = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

struct Deferred {
    key: (EntityKind, i64),
    action: DeferredFn,
}

/// The boundary of one logical write transaction.
///
/// Create one scope per write operation, dispatch events through it, then
/// either `commit()` or `rollback()` it. Dropping a scope without
/// committing discards the deferred actions, same as a rollback.
#[derive(Default)]
pub struct TxScope {
    deferred: Vec<Deferred>,
    seen: HashSet<(EntityKind, i64)>,
}

impl TxScope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action to run after this scope commits.
    ///
    /// If an action is already registered for the same (kind, entity id)
    /// pair, the new one is dropped: the first registration wins and later
    /// re-triggers within the same transaction are collapsed.
    pub fn on_commit<F, Fut>(&mut self, kind: EntityKind, entity_id: i64, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let key = (kind, entity_id);
        if !self.seen.insert(key) {
            tracing::debug!(
                "Deferred action for {:?} id={} already scheduled in this transaction",
                kind,
                entity_id
            );
            return;
        }

        self.deferred.push(Deferred {
            key,
            action: Box::new(move || -> BoxFuture<'static, anyhow::Result<()>> {
                Box::pin(action())
            }),
        });
    }

    /// Number of deferred actions currently registered.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Commit the scope: run every deferred action once, in registration
    /// order. Action failures are logged with the acting entity's identity
    /// and swallowed.
    pub async fn commit(self) {
        for deferred in self.deferred {
            let (kind, entity_id) = deferred.key;
            if let Err(e) = (deferred.action)().await {
                tracing::error!(
                    "Deferred action for {:?} id={} failed: {:#}",
                    kind,
                    entity_id,
                    e
                );
            }
        }
    }

    /// Roll back the scope: discard all deferred actions.
    pub fn rollback(self) {
        if !self.deferred.is_empty() {
            tracing::debug!(
                "Rolled back transaction scope, discarding {} deferred action(s)",
                self.deferred.len()
            );
        }
    }
}
