//! Emitter bridge - forwards collection changes to an [`EventEmitter`] so
//! other stores can react (e.g. finance totals following reservations).
//!
//! Events are named `"<collection>:changed"` and carry a JSON-encoded
//! [`ChangeEvent`]. Listeners run on the emitter's own threads, never on the
//! thread that mutated the collection, so they may mutate any collection.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use event_emitter_rs::EventEmitter;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::collection::CollectionState;
use crate::coordinator::OptimisticCollection;
use crate::entity::Entity;
use crate::mutation::MutationError;
use crate::notify::Subscription;

/// One collection transition as seen by emitter listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub collection: String,
    /// `replaced`, `inserted`, `updated` or `removed`.
    pub kind: String,
    pub id: Option<String>,
    pub revision: u64,
}

impl ChangeEvent {
    fn from_state<E: Entity>(state: &CollectionState<E>) -> Self {
        let change = state.last_change();
        Self {
            collection: E::COLLECTION.to_string(),
            kind: change.map_or("replaced", |c| c.kind()).to_string(),
            id: change.and_then(|c| c.id()).map(str::to_string),
            revision: state.revision(),
        }
    }
}

/// Shared emitter for collection change events. Clones share listeners.
#[derive(Clone)]
pub struct ChangeEmitter {
    emitter: Arc<Mutex<EventEmitter>>,
}

impl Default for ChangeEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeEmitter {
    pub fn new() -> Self {
        Self {
            emitter: Arc::new(Mutex::new(EventEmitter::new())),
        }
    }

    pub fn event_name(collection: &str) -> String {
        format!("{collection}:changed")
    }

    /// Emit a [`ChangeEvent`] for every transition of `collection` until the
    /// returned subscription is unsubscribed.
    pub fn attach<E: Entity>(&self, collection: &OptimisticCollection<E>) -> Result<Subscription, MutationError> {
        let emitter = Arc::clone(&self.emitter);
        let event_name = Self::event_name(E::COLLECTION);
        collection.subscribe(
            |state: &CollectionState<E>| ChangeEvent::from_state(state),
            move |event: &ChangeEvent| match serde_json::to_string(event) {
                Ok(payload) => {
                    lock(&emitter).emit(&event_name, payload);
                }
                Err(err) => warn!(error = %err, "failed to encode change event"),
            },
        )
    }

    /// Listen to changes of `collection`. Returns the listener id.
    pub fn on<F>(&self, collection: &str, listener: F) -> String
    where
        F: Fn(ChangeEvent) + Send + Sync + 'static,
    {
        let event_name = Self::event_name(collection);
        lock(&self.emitter).on(&event_name, move |payload: String| {
            match serde_json::from_str::<ChangeEvent>(&payload) {
                Ok(event) => listener(event),
                Err(err) => warn!(error = %err, "dropping malformed change event"),
            }
        })
    }

    /// Remove a listener by id. Returns the id if it was registered.
    pub fn remove_listener(&self, listener_id: &str) -> Option<String> {
        lock(&self.emitter).remove_listener(listener_id)
    }
}

// Emitting cannot leave the listener table half-updated.
fn lock(emitter: &Mutex<EventEmitter>) -> MutexGuard<'_, EventEmitter> {
    emitter.lock().unwrap_or_else(PoisonError::into_inner)
}
