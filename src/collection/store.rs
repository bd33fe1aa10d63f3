use std::sync::Arc;

use tracing::trace;

use crate::entity::{Entity, Patch};
use crate::notify::{StateChangeNotifier, Subscription};
use crate::persist::CollectionSnapshot;

use super::{Change, CollectionError, CollectionState, Position};

/// Authoritative in-memory copy of one entity collection.
///
/// Every successful mutation bumps the revision, records the [`Change`], and
/// runs the store's subscriptions against the new state before returning.
/// A store owned by a shared coordinator queues the new state instead, and
/// the coordinator delivers it once its lock is released.
pub struct CollectionStore<E: Entity> {
    state: CollectionState<E>,
    notifier: Arc<StateChangeNotifier<CollectionState<E>>>,
    deferred: bool,
}

impl<E: Entity> Default for CollectionStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> CollectionStore<E> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            state: CollectionState::default(),
            notifier: Arc::new(StateChangeNotifier::new()),
            deferred: false,
        }
    }

    /// Create a store pre-populated with `entities` (no notification).
    pub fn with_entities(entities: Vec<E>) -> Result<Self, CollectionError> {
        let mut store = Self::new();
        store.install(entities)?;
        Ok(store)
    }

    pub fn state(&self) -> &CollectionState<E> {
        &self.state
    }

    pub fn get(&self, id: &str) -> Option<&E> {
        self.state.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.contains(id)
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.state.revision
    }

    /// Discard prior contents and install `entities` in the given order.
    ///
    /// If an id appears more than once, the last value wins and keeps the
    /// position of the first occurrence.
    pub fn replace_all(&mut self, entities: Vec<E>) -> Result<(), CollectionError> {
        self.install(entities)?;
        trace!(collection = E::COLLECTION, len = self.state.len(), "collection replaced");
        self.publish(Change::Replaced);
        Ok(())
    }

    /// Current contents and revision, for persistence.
    pub fn snapshot(&self) -> CollectionSnapshot<E> {
        CollectionSnapshot::new(self.state.revision, self.state.to_vec())
    }

    /// Install a persisted snapshot. The revision never moves backwards.
    pub fn restore(&mut self, snapshot: CollectionSnapshot<E>) -> Result<(), CollectionError> {
        self.install(snapshot.entities)?;
        self.state.revision = self.state.revision.max(snapshot.revision);
        trace!(collection = E::COLLECTION, len = self.state.len(), "collection restored");
        self.publish(Change::Replaced);
        Ok(())
    }

    /// Remove every entity (session reset).
    pub fn clear(&mut self) {
        self.state.entities.clear();
        self.state.index.clear();
        self.publish(Change::Replaced);
    }

    /// Insert a new entity at the start or end of the collection.
    pub fn insert(&mut self, entity: E, position: Position) -> Result<(), CollectionError> {
        let at = match position {
            Position::Start => 0,
            Position::End => self.state.len(),
        };
        self.insert_at(entity, at)
    }

    /// Insert a new entity at `index` (clamped to the collection length).
    pub fn insert_at(&mut self, entity: E, index: usize) -> Result<(), CollectionError> {
        validate(&entity)?;
        if self.state.contains(entity.id()) {
            return Err(CollectionError::DuplicateId {
                collection: E::COLLECTION,
                id: entity.id().to_string(),
            });
        }

        let at = index.min(self.state.len());
        let id = entity.id().to_string();
        self.state.entities.insert(at, entity);
        self.state.reindex_from(at);
        self.publish(Change::Inserted { id });
        Ok(())
    }

    /// Shallow-merge `patch` into the entity with `id`.
    pub fn update(&mut self, id: &str, patch: &Patch) -> Result<&E, CollectionError> {
        let pos = self.require(id)?;
        let merged = patch.apply(&self.state.entities[pos])?;
        if merged.id() != id {
            return Err(CollectionError::IdentifierChanged {
                collection: E::COLLECTION,
                id: id.to_string(),
                new_id: merged.id().to_string(),
            });
        }

        self.state.entities[pos] = merged;
        self.publish(Change::Updated { id: id.to_string() });
        Ok(&self.state.entities[pos])
    }

    /// Replace an existing entity wholesale, keeping its position.
    pub fn replace(&mut self, entity: E) -> Result<(), CollectionError> {
        let pos = self.require(entity.id())?;
        let id = entity.id().to_string();
        self.state.entities[pos] = entity;
        self.publish(Change::Updated { id });
        Ok(())
    }

    /// Remove the entity with `id`, returning it with the position it held.
    pub fn remove(&mut self, id: &str) -> Result<(E, usize), CollectionError> {
        let pos = self.require(id)?;
        let entity = self.state.entities.remove(pos);
        self.state.index.remove(id);
        self.state.reindex_from(pos);
        self.publish(Change::Removed { id: id.to_string() });
        Ok((entity, pos))
    }

    /// Subscribe to a slice of this collection.
    pub fn subscribe<T, F, C>(&self, selector: F, on_change: C) -> Subscription
    where
        T: PartialEq + Send + 'static,
        F: Fn(&CollectionState<E>) -> T + Send + Sync + 'static,
        C: Fn(&T) + Send + Sync + 'static,
    {
        self.notifier.subscribe(&self.state, selector, on_change)
    }

    /// Subscribe with a custom equality function.
    pub fn subscribe_with<T, F, C, Q>(&self, selector: F, on_change: C, equals: Q) -> Subscription
    where
        T: Send + 'static,
        F: Fn(&CollectionState<E>) -> T + Send + Sync + 'static,
        C: Fn(&T) + Send + Sync + 'static,
        Q: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        self.notifier
            .subscribe_with(&self.state, selector, on_change, equals)
    }

    pub fn subscriber_count(&self) -> usize {
        self.notifier.len()
    }

    /// Queue transitions instead of notifying inline. The caller must
    /// `flush` the returned notifier after each write.
    pub(crate) fn defer_notifications(&mut self) -> Arc<StateChangeNotifier<CollectionState<E>>> {
        self.deferred = true;
        Arc::clone(&self.notifier)
    }

    fn install(&mut self, entities: Vec<E>) -> Result<(), CollectionError> {
        for entity in &entities {
            validate(entity)?;
        }

        self.state.entities.clear();
        self.state.index.clear();
        for entity in entities {
            let existing = self.state.index.get(entity.id()).copied();
            match existing {
                Some(pos) => self.state.entities[pos] = entity,
                None => {
                    self.state
                        .index
                        .insert(entity.id().to_string(), self.state.entities.len());
                    self.state.entities.push(entity);
                }
            }
        }
        Ok(())
    }

    fn require(&self, id: &str) -> Result<usize, CollectionError> {
        self.state
            .position(id)
            .ok_or_else(|| CollectionError::NotFound {
                collection: E::COLLECTION,
                id: id.to_string(),
            })
    }

    fn publish(&mut self, change: Change) {
        self.state.revision += 1;
        self.state.last_change = Some(change);
        if self.deferred {
            self.notifier.enqueue(self.state.clone());
        } else {
            self.notifier.notify(&self.state);
        }
    }
}

fn validate<E: Entity>(entity: &E) -> Result<(), CollectionError> {
    if entity.id().is_empty() {
        return Err(CollectionError::InvalidEntity {
            collection: E::COLLECTION,
            reason: "identifier must not be empty".into(),
        });
    }
    Ok(())
}
