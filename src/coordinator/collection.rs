use std::future::Future;
use std::pin::pin;
use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::collection::{CollectionState, CollectionStore};
use crate::config::CoordinatorConfig;
use crate::entity::Entity;
use crate::mutation::{
    MutationError, MutationId, MutationRequest, MutationResolution, MutationState,
    MutationTracker,
};
use crate::notify::{StateChangeNotifier, Subscription};
use crate::persist::{CollectionSnapshot, PersistError, PersistedStore};

use super::queue::TargetQueue;
use super::{DataService, ServiceError};

/// State shared by every clone of one collection.
struct Shared<E: Entity> {
    tracker: RwLock<MutationTracker<E>>,
    notifier: Arc<StateChangeNotifier<CollectionState<E>>>,
    /// Signalled whenever a mutation leaves the applied state.
    settled: Notify,
}

impl<E: Entity> Shared<E> {
    fn read(&self) -> Result<RwLockReadGuard<'_, MutationTracker<E>>, MutationError> {
        self.tracker
            .read()
            .map_err(|_| MutationError::LockPoisoned("collection read"))
    }

    /// Run `f` under the write lock, then deliver the queued transitions.
    fn write<R>(&self, f: impl FnOnce(&mut MutationTracker<E>) -> R) -> Result<R, MutationError> {
        let result = {
            let mut tracker = self
                .tracker
                .write()
                .map_err(|_| MutationError::LockPoisoned("collection write"))?;
            f(&mut tracker)
        };
        self.notifier.flush();
        Ok(result)
    }

    /// Like `write` for operations that may resolve mutations.
    fn resolve<R>(&self, f: impl FnOnce(&mut MutationTracker<E>) -> R) -> Result<R, MutationError> {
        let result = self.write(f);
        self.settled.notify_waiters();
        result
    }
}

/// Rolls back a mutation whose round trip was dropped before it resolved.
struct RollbackOnDrop<E: Entity> {
    shared: Arc<Shared<E>>,
    mutation_id: Option<MutationId>,
}

impl<E: Entity> RollbackOnDrop<E> {
    fn disarm(&mut self) {
        self.mutation_id = None;
    }
}

impl<E: Entity> Drop for RollbackOnDrop<E> {
    fn drop(&mut self) {
        let Some(mutation_id) = self.mutation_id.take() else {
            return;
        };
        let undone = self.shared.resolve(|tracker| {
            if tracker.state(&mutation_id) == Some(MutationState::Applied) {
                tracker.rollback(&mutation_id)
            } else {
                Ok(())
            }
        });
        match undone {
            Ok(Ok(())) => warn!(
                collection = E::COLLECTION,
                mutation_id = %mutation_id,
                "abandoned mutation rolled back"
            ),
            Ok(Err(err)) | Err(err) => warn!(
                collection = E::COLLECTION,
                mutation_id = %mutation_id,
                error = %err,
                "failed to roll back abandoned mutation"
            ),
        }
    }
}

/// One entity collection with optimistic mutations.
///
/// Clone-friendly via Arc: clones share the same store, tracker, and queue.
/// Store transitions happen under a single write lock, so subscribers never
/// observe a half-applied mutation. Callbacks run after that lock is released
/// and may read, subscribe to, or mutate the collection; transitions caused
/// from inside a callback are delivered after the current pass.
pub struct OptimisticCollection<E: Entity> {
    shared: Arc<Shared<E>>,
    queue: Arc<TargetQueue>,
    config: CoordinatorConfig,
}

impl<E: Entity> Clone for OptimisticCollection<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            queue: Arc::clone(&self.queue),
            config: self.config.clone(),
        }
    }
}

impl<E: Entity> Default for OptimisticCollection<E> {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default())
    }
}

impl<E: Entity> OptimisticCollection<E> {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self::with_store(CollectionStore::new(), config)
    }

    pub fn with_store(mut store: CollectionStore<E>, config: CoordinatorConfig) -> Self {
        let notifier = store.defer_notifications();
        let tracker = MutationTracker::new(store, &config);
        Self {
            shared: Arc::new(Shared {
                tracker: RwLock::new(tracker),
                notifier,
                settled: Notify::new(),
            }),
            queue: Arc::new(TargetQueue::new()),
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Run `f` against the current collection state.
    pub fn read<R>(&self, f: impl FnOnce(&CollectionState<E>) -> R) -> Result<R, MutationError> {
        Ok(f(self.shared.read()?.store().state()))
    }

    pub fn get(&self, id: &str) -> Result<Option<E>, MutationError> {
        self.read(|state| state.get(id).cloned())
    }

    /// All entities in stored order.
    pub fn snapshot(&self) -> Result<Vec<E>, MutationError> {
        self.read(|state| state.to_vec())
    }

    pub fn len(&self) -> Result<usize, MutationError> {
        self.read(|state| state.len())
    }

    pub fn state_of(&self, mutation_id: &MutationId) -> Result<Option<MutationState>, MutationError> {
        Ok(self.shared.read()?.state(mutation_id))
    }

    pub fn pending_len(&self) -> Result<usize, MutationError> {
        Ok(self.shared.read()?.pending_len())
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    pub fn subscribe<T, F, C>(&self, selector: F, on_change: C) -> Result<Subscription, MutationError>
    where
        T: PartialEq + Send + 'static,
        F: Fn(&CollectionState<E>) -> T + Send + Sync + 'static,
        C: Fn(&T) + Send + Sync + 'static,
    {
        Ok(self.shared.read()?.store().subscribe(selector, on_change))
    }

    pub fn subscribe_with<T, F, C, Q>(
        &self,
        selector: F,
        on_change: C,
        equals: Q,
    ) -> Result<Subscription, MutationError>
    where
        T: Send + 'static,
        F: Fn(&CollectionState<E>) -> T + Send + Sync + 'static,
        C: Fn(&T) + Send + Sync + 'static,
        Q: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Ok(self
            .shared
            .read()?
            .store()
            .subscribe_with(selector, on_change, equals))
    }

    // ========================================================================
    // Synchronous mutation steps
    // ========================================================================

    /// Install a full fetch result.
    pub fn replace_all(&self, entities: Vec<E>) -> Result<(), MutationError> {
        self.shared.write(|tracker| tracker.replace_all(entities))??;
        Ok(())
    }

    /// Apply `request` optimistically without dispatching anything.
    pub fn begin(&self, request: MutationRequest<E>) -> Result<MutationId, MutationError> {
        self.shared.write(|tracker| tracker.begin(request))?
    }

    pub fn commit(&self, mutation_id: &MutationId) -> Result<(), MutationError> {
        self.shared.resolve(|tracker| tracker.commit(mutation_id))?
    }

    pub fn rollback(&self, mutation_id: &MutationId) -> Result<(), MutationError> {
        self.shared.resolve(|tracker| tracker.rollback(mutation_id))?
    }

    /// Apply a resolution reported by the data-fetching layer.
    pub fn resolve(&self, resolution: &MutationResolution) -> Result<(), MutationError> {
        self.shared.resolve(|tracker| tracker.resolve(resolution))?
    }

    /// Roll back every pending mutation older than `timeout`.
    pub fn rollback_expired(&self, timeout: Duration) -> Result<Vec<MutationId>, MutationError> {
        let expired = self
            .shared
            .resolve(|tracker| tracker.rollback_expired(timeout))??;
        if !expired.is_empty() {
            warn!(collection = E::COLLECTION, count = expired.len(), "expired mutations rolled back");
        }
        Ok(expired)
    }

    /// Drop all entities and mutation bookkeeping.
    pub fn reset(&self) -> Result<(), MutationError> {
        self.shared.resolve(|tracker| tracker.reset())?;
        debug!(collection = E::COLLECTION, "collection reset");
        Ok(())
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Save the current entities under the collection name.
    ///
    /// Optimistic values still pending are saved as they are shown.
    pub fn persist<S>(&self, store: &S) -> Result<(), PersistError>
    where
        S: PersistedStore + ?Sized,
    {
        let snapshot = self
            .shared
            .read()
            .map_err(|_| PersistError::LockPoisoned("collection read"))?
            .store()
            .snapshot();
        store.save(E::COLLECTION, snapshot.encode()?)?;
        debug!(
            collection = E::COLLECTION,
            revision = snapshot.revision,
            len = snapshot.entities.len(),
            "collection persisted"
        );
        Ok(())
    }

    /// Load the saved snapshot, if any. Returns whether one was found.
    pub fn hydrate<S>(&self, store: &S) -> Result<bool, PersistError>
    where
        S: PersistedStore + ?Sized,
    {
        let Some(bytes) = store.load(E::COLLECTION)? else {
            return Ok(false);
        };
        let snapshot = CollectionSnapshot::<E>::decode(&bytes)?;
        self.shared
            .write(|tracker| tracker.restore(snapshot))
            .map_err(|_| PersistError::LockPoisoned("collection write"))??;
        Ok(true)
    }

    // ========================================================================
    // Full optimistic round trips
    // ========================================================================

    /// Apply `request`, await `backing`, then commit or roll back.
    ///
    /// `backing` must be lazy (an `async` block or an un-polled future); it is
    /// first polled after the optimistic apply. Uses the configured timeout.
    /// Fails fast with `ConcurrentMutation` if the target is busy. Dropping
    /// the returned future before it completes rolls the mutation back.
    pub async fn mutate<Fut>(&self, request: MutationRequest<E>, backing: Fut) -> Result<MutationId, MutationError>
    where
        Fut: Future<Output = Result<(), ServiceError>>,
    {
        self.mutate_with_timeout(request, self.config.default_timeout(), backing)
            .await
    }

    /// `mutate` with an explicit timeout.
    pub async fn mutate_with_timeout<Fut>(
        &self,
        request: MutationRequest<E>,
        timeout: Duration,
        backing: Fut,
    ) -> Result<MutationId, MutationError>
    where
        Fut: Future<Output = Result<(), ServiceError>>,
    {
        let mutation_id = self.begin(request)?;
        self.settle(mutation_id, timeout, backing).await
    }

    /// Like `mutate`, but waits for any unresolved mutation on the same
    /// target, queued or not, instead of failing.
    pub async fn mutate_queued<Fut>(&self, request: MutationRequest<E>, backing: Fut) -> Result<MutationId, MutationError>
    where
        Fut: Future<Output = Result<(), ServiceError>>,
    {
        let _turn = self.queue.acquire(&request.target_id).await?;
        let mutation_id = self.begin_when_idle(request).await?;
        self.settle(mutation_id, self.config.default_timeout(), backing)
            .await
    }

    /// Apply `request` and send it to `service`.
    pub async fn dispatch<S>(&self, service: &S, request: MutationRequest<E>) -> Result<MutationId, MutationError>
    where
        S: DataService<E> + ?Sized,
    {
        let sent = request.clone();
        self.mutate(request, async move { service.execute(&sent).await })
            .await
    }

    /// `dispatch`, queued behind earlier mutations on the same target.
    pub async fn dispatch_queued<S>(&self, service: &S, request: MutationRequest<E>) -> Result<MutationId, MutationError>
    where
        S: DataService<E> + ?Sized,
    {
        let sent = request.clone();
        self.mutate_queued(request, async move { service.execute(&sent).await })
            .await
    }

    async fn begin_when_idle(&self, mut request: MutationRequest<E>) -> Result<MutationId, MutationError> {
        loop {
            let mut settled = pin!(self.shared.settled.notified());
            settled.as_mut().enable();
            match self.begin_if_idle(request)? {
                Ok(mutation_id) => return Ok(mutation_id),
                Err(busy) => request = busy,
            }
            settled.await;
        }
    }

    /// Begin `request` unless its target has a mutation in flight, in which
    /// case the request is handed back.
    fn begin_if_idle(
        &self,
        request: MutationRequest<E>,
    ) -> Result<Result<MutationId, MutationRequest<E>>, MutationError> {
        self.shared
            .write(|tracker| {
                if tracker.pending_for(&request.target_id).is_some() {
                    return Ok(Err(request));
                }
                tracker.begin(request).map(Ok)
            })
            .and_then(|attempt| attempt)
    }

    async fn settle<Fut>(&self, mutation_id: MutationId, timeout: Duration, backing: Fut) -> Result<MutationId, MutationError>
    where
        Fut: Future<Output = Result<(), ServiceError>>,
    {
        let mut abandoned = RollbackOnDrop {
            shared: Arc::clone(&self.shared),
            mutation_id: Some(mutation_id.clone()),
        };
        let outcome = tokio::time::timeout(timeout, backing).await;
        abandoned.disarm();

        match outcome {
            Ok(Ok(())) => {
                self.commit(&mutation_id)?;
                Ok(mutation_id)
            }
            Ok(Err(err)) => {
                self.rollback(&mutation_id)?;
                Err(MutationError::Rejected {
                    mutation_id,
                    reason: err.to_string(),
                })
            }
            Err(_) => {
                self.rollback(&mutation_id)?;
                warn!(
                    collection = E::COLLECTION,
                    mutation_id = %mutation_id,
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "backing request timed out"
                );
                Err(MutationError::Timeout {
                    mutation_id,
                    after: timeout,
                })
            }
        }
    }
}
