use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::mutation::MutationError;

/// Per-target async locks used to queue mutations on the same entity.
///
/// Lazily creates one lock per target id and hands out the same lock for
/// repeated lookups. Waiters are served in arrival order.
#[derive(Default)]
pub(crate) struct TargetQueue {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl TargetQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait until no other queued mutation holds `target_id`.
    pub(crate) async fn acquire(&self, target_id: &str) -> Result<OwnedMutexGuard<()>, MutationError> {
        let lock = self.get_lock(target_id)?;
        Ok(lock.lock_owned().await)
    }

    fn get_lock(&self, target_id: &str) -> Result<Arc<AsyncMutex<()>>, MutationError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| MutationError::LockPoisoned("target queue"))?;
        // Only the map holds idle locks; drop them so the map tracks live targets.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(locks
            .entry(target_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone())
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_target_shares_lock() {
        let queue = TargetQueue::new();
        let guard = queue.acquire("r1").await.unwrap();

        let lock = queue.get_lock("r1").unwrap();
        assert!(lock.try_lock().is_err());
        drop(guard);
        assert!(lock.try_lock().is_ok());
    }

    #[tokio::test]
    async fn different_targets_do_not_contend() {
        let queue = TargetQueue::new();
        let _a = queue.acquire("r1").await.unwrap();
        let _b = queue.acquire("r2").await.unwrap();
        assert_eq!(queue.tracked(), 2);
    }

    #[tokio::test]
    async fn idle_locks_are_dropped() {
        let queue = TargetQueue::new();
        drop(queue.acquire("r1").await.unwrap());
        let _b = queue.acquire("r2").await.unwrap();
        assert_eq!(queue.tracked(), 1);
    }
}
