use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use super::{Clock, KeyPattern, SystemClock};

/// A cached value with its creation time and time-to-live.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.ttl
    }
}

/// TTL keyed cache. Clone-friendly: clones share the same entries.
pub struct CacheLayer<V> {
    entries: Arc<RwLock<HashMap<String, CacheEntry<V>>>>,
    clock: Arc<dyn Clock>,
}

impl<V> Clone for CacheLayer<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<V: Clone> Default for CacheLayer<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> CacheLayer<V> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock: Arc::new(clock),
        }
    }

    /// Store `value` under `key`, replacing any existing entry.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            created_at: self.clock.now(),
            ttl,
        };
        self.write().insert(key.into(), entry);
    }

    /// The live value for `key`. Expired entries are evicted and read as absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        {
            let entries = self.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.write();
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
            trace!(key = %key, "cache entry expired");
        }
        None
    }

    /// The cached value for `key`, computing and storing it on a miss.
    pub fn get_or_insert_with<F>(&self, key: &str, ttl: Duration, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(key) {
            return value;
        }
        let value = compute();
        self.set(key, value.clone(), ttl);
        value
    }

    /// Like `get_or_insert_with` for fallible async fetches. Failures are not cached.
    pub async fn get_or_fetch<F, Fut, Err>(&self, key: &str, ttl: Duration, fetch: F) -> Result<V, Err>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, Err>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = fetch().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    /// Remove entries matching `pattern`, or every entry when `pattern` is `None`.
    /// Returns how many entries were removed.
    pub fn invalidate(&self, pattern: Option<&KeyPattern>) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        match pattern {
            Some(pattern) => entries.retain(|key, _| !pattern.matches(key)),
            None => entries.clear(),
        }
        let removed = before - entries.len();
        trace!(removed = removed, "cache invalidated");
        removed
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Every write leaves the map consistent, so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
