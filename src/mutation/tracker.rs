use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::collection::{CollectionError, CollectionStore, Position};
use crate::config::CoordinatorConfig;
use crate::entity::Entity;
use crate::persist::CollectionSnapshot;

use super::{
    MutationError, MutationId, MutationKind, MutationOp, MutationRequest, MutationResolution,
    MutationState, Outcome,
};

/// What the target looked like before the optimistic apply.
#[derive(Debug, Clone, PartialEq)]
pub enum Prior<E> {
    /// The target did not exist (creates).
    Absent,
    /// The target's full value and position (updates and deletes).
    Present { entity: E, position: usize },
}

/// One in-flight optimistic change and its rollback data.
#[derive(Debug, Clone)]
pub struct PendingMutation<E> {
    pub mutation_id: MutationId,
    pub target_id: String,
    pub op: MutationOp<E>,
    pub prior: Prior<E>,
    pub began_at: Instant,
    sequence: u64,
}

impl<E> PendingMutation<E> {
    pub fn kind(&self) -> MutationKind {
        self.op.kind()
    }
}

/// Applies mutations optimistically to one [`CollectionStore`] and keeps what
/// is needed to undo them.
///
/// At most one mutation per target id is pending at a time.
pub struct MutationTracker<E: Entity> {
    store: CollectionStore<E>,
    pending: HashMap<MutationId, PendingMutation<E>>,
    in_flight: HashMap<String, MutationId>,
    resolved: LruCache<MutationId, MutationState>,
    default_position: Position,
    next_sequence: u64,
}

impl<E: Entity> Default for MutationTracker<E> {
    fn default() -> Self {
        Self::new(CollectionStore::new(), &CoordinatorConfig::default())
    }
}

impl<E: Entity> MutationTracker<E> {
    pub fn new(store: CollectionStore<E>, config: &CoordinatorConfig) -> Self {
        let capacity = NonZeroUsize::new(config.resolved_history).unwrap_or(NonZeroUsize::MIN);
        MutationTracker {
            store,
            pending: HashMap::new(),
            in_flight: HashMap::new(),
            resolved: LruCache::new(capacity),
            default_position: config.default_position,
            next_sequence: 0,
        }
    }

    pub fn store(&self) -> &CollectionStore<E> {
        &self.store
    }

    /// Install a freshly fetched collection. Pending mutations keep their
    /// rollback data and still resolve normally.
    pub fn replace_all(&mut self, entities: Vec<E>) -> Result<(), CollectionError> {
        self.store.replace_all(entities)
    }

    /// Install a persisted snapshot, like [`replace_all`](Self::replace_all).
    pub fn restore(&mut self, snapshot: CollectionSnapshot<E>) -> Result<(), CollectionError> {
        self.store.restore(snapshot)
    }

    /// Apply `request` to the store and start tracking it.
    pub fn begin(&mut self, request: MutationRequest<E>) -> Result<MutationId, MutationError> {
        let MutationRequest {
            mutation_id,
            target_id,
            op,
            position,
        } = request;

        if self.pending.contains_key(&mutation_id) || self.resolved.contains(&mutation_id) {
            return Err(MutationError::DuplicateMutationId { mutation_id });
        }
        if let Some(pending) = self.in_flight.get(&target_id) {
            return Err(MutationError::ConcurrentMutation {
                collection: E::COLLECTION,
                target_id,
                pending: pending.clone(),
            });
        }

        let prior = match &op {
            MutationOp::Create(entity) => {
                if entity.id() != target_id {
                    return Err(CollectionError::InvalidEntity {
                        collection: E::COLLECTION,
                        reason: format!(
                            "create payload id {} does not match target {}",
                            entity.id(),
                            target_id
                        ),
                    }
                    .into());
                }
                if self.store.contains(&target_id) {
                    return Err(MutationError::Conflict {
                        collection: E::COLLECTION,
                        target_id,
                    });
                }
                let at = position.unwrap_or(self.default_position);
                self.store.insert(entity.clone(), at)?;
                Prior::Absent
            }
            MutationOp::Update(patch) => {
                let (entity, position) = self.current(&target_id)?;
                self.store.update(&target_id, patch)?;
                Prior::Present { entity, position }
            }
            MutationOp::Delete => {
                self.current(&target_id)?;
                let (entity, position) = self.store.remove(&target_id)?;
                Prior::Present { entity, position }
            }
        };

        debug!(
            collection = E::COLLECTION,
            mutation_id = %mutation_id,
            target_id = %target_id,
            kind = %op.kind(),
            "optimistic mutation applied"
        );

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.in_flight.insert(target_id.clone(), mutation_id.clone());
        self.pending.insert(
            mutation_id.clone(),
            PendingMutation {
                mutation_id: mutation_id.clone(),
                target_id,
                op,
                prior,
                began_at: Instant::now(),
                sequence,
            },
        );
        Ok(mutation_id)
    }

    /// Accept the optimistic value as final.
    pub fn commit(&mut self, mutation_id: &MutationId) -> Result<(), MutationError> {
        let pending = self.take_pending(mutation_id)?;
        self.resolved.put(pending.mutation_id, MutationState::Committed);
        debug!(
            collection = E::COLLECTION,
            mutation_id = %mutation_id,
            target_id = %pending.target_id,
            "optimistic mutation committed"
        );
        Ok(())
    }

    /// Undo the optimistic value, restoring the target's prior state.
    pub fn rollback(&mut self, mutation_id: &MutationId) -> Result<(), MutationError> {
        let pending = self.take_pending(mutation_id)?;
        self.resolved
            .put(pending.mutation_id.clone(), MutationState::RolledBack);
        debug!(
            collection = E::COLLECTION,
            mutation_id = %mutation_id,
            target_id = %pending.target_id,
            kind = %pending.kind(),
            "optimistic mutation rolled back"
        );
        self.undo(&pending.target_id, pending.prior)?;
        Ok(())
    }

    /// Commit or roll back according to the backing request's outcome.
    pub fn resolve(&mut self, resolution: &MutationResolution) -> Result<(), MutationError> {
        match resolution.outcome {
            Outcome::Success => self.commit(&resolution.mutation_id),
            Outcome::Failure => {
                if let Some(kind) = resolution.error {
                    trace!(mutation_id = %resolution.mutation_id, error = ?kind, "backing request failed");
                }
                self.rollback(&resolution.mutation_id)
            }
        }
    }

    /// Current lifecycle state, if the mutation is pending or still remembered.
    pub fn state(&self, mutation_id: &MutationId) -> Option<MutationState> {
        if self.pending.contains_key(mutation_id) {
            return Some(MutationState::Applied);
        }
        self.resolved.peek(mutation_id).copied()
    }

    pub fn pending(&self, mutation_id: &MutationId) -> Option<&PendingMutation<E>> {
        self.pending.get(mutation_id)
    }

    /// The mutation currently in flight for `target_id`, if any.
    pub fn pending_for(&self, target_id: &str) -> Option<&MutationId> {
        self.in_flight.get(target_id)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Pending mutations that began more than `timeout` ago, oldest first.
    pub fn expired(&self, timeout: Duration) -> Vec<MutationId> {
        let now = Instant::now();
        let mut stale: Vec<&PendingMutation<E>> = self
            .pending
            .values()
            .filter(|p| now.saturating_duration_since(p.began_at) > timeout)
            .collect();
        stale.sort_by_key(|p| p.sequence);
        stale.into_iter().map(|p| p.mutation_id.clone()).collect()
    }

    /// Roll back every mutation older than `timeout`.
    pub fn rollback_expired(&mut self, timeout: Duration) -> Result<Vec<MutationId>, MutationError> {
        let expired = self.expired(timeout);
        for mutation_id in &expired {
            self.rollback(mutation_id)?;
        }
        Ok(expired)
    }

    /// Roll back everything still pending, newest first.
    pub fn rollback_all(&mut self) -> Result<usize, MutationError> {
        let mut ids: Vec<(u64, MutationId)> = self
            .pending
            .values()
            .map(|p| (p.sequence, p.mutation_id.clone()))
            .collect();
        ids.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        for (_, mutation_id) in &ids {
            self.rollback(mutation_id)?;
        }
        Ok(ids.len())
    }

    /// Forget all mutations and empty the store (logout).
    pub fn reset(&mut self) {
        self.pending.clear();
        self.in_flight.clear();
        self.resolved.clear();
        self.store.clear();
    }

    fn current(&self, target_id: &str) -> Result<(E, usize), MutationError> {
        let state = self.store.state();
        match (state.get(target_id), state.position(target_id)) {
            (Some(entity), Some(position)) => Ok((entity.clone(), position)),
            _ => Err(MutationError::NotFound {
                collection: E::COLLECTION,
                target_id: target_id.to_string(),
            }),
        }
    }

    fn take_pending(&mut self, mutation_id: &MutationId) -> Result<PendingMutation<E>, MutationError> {
        match self.pending.remove(mutation_id) {
            Some(pending) => {
                self.in_flight.remove(&pending.target_id);
                Ok(pending)
            }
            None => Err(MutationError::StaleMutation {
                mutation_id: mutation_id.clone(),
                state: self.resolved.peek(mutation_id).copied(),
            }),
        }
    }

    fn undo(&mut self, target_id: &str, prior: Prior<E>) -> Result<(), CollectionError> {
        match prior {
            Prior::Absent => {
                if self.store.contains(target_id) {
                    self.store.remove(target_id)?;
                }
            }
            Prior::Present { entity, position } => {
                if self.store.contains(target_id) {
                    self.store.replace(entity)?;
                } else {
                    self.store.insert_at(entity, position)?;
                }
            }
        }
        Ok(())
    }
}
