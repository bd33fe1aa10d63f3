use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::PersistError;

/// Key-value persistence for encoded snapshots. One value per key (latest wins).
pub trait PersistedStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, PersistError>;

    fn save(&self, key: &str, bytes: Vec<u8>) -> Result<(), PersistError>;

    /// Returns true if a value existed.
    fn remove(&self, key: &str) -> Result<bool, PersistError>;
}

/// In-memory persisted store. Clones share the same storage.
#[derive(Clone, Default)]
pub struct InMemoryPersistedStore {
    storage: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryPersistedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Result<Vec<String>, PersistError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| PersistError::LockPoisoned("persisted read"))?;
        let mut keys: Vec<String> = storage.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

impl PersistedStore for InMemoryPersistedStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, PersistError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| PersistError::LockPoisoned("persisted read"))?;
        Ok(storage.get(key).cloned())
    }

    fn save(&self, key: &str, bytes: Vec<u8>) -> Result<(), PersistError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| PersistError::LockPoisoned("persisted write"))?;
        storage.insert(key.to_string(), bytes);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, PersistError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| PersistError::LockPoisoned("persisted write"))?;
        Ok(storage.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_overwrites_and_load_sees_latest() {
        let store = InMemoryPersistedStore::new();
        store.save("clients", vec![1]).unwrap();
        store.save("clients", vec![2, 3]).unwrap();
        assert_eq!(store.load("clients").unwrap(), Some(vec![2, 3]));
        assert_eq!(store.load("missing").unwrap(), None);
    }

    #[test]
    fn remove_reports_presence() {
        let store = InMemoryPersistedStore::new();
        store.save("clients", vec![1]).unwrap();
        assert!(store.remove("clients").unwrap());
        assert!(!store.remove("clients").unwrap());
    }

    #[test]
    fn clones_share_storage() {
        let store = InMemoryPersistedStore::new();
        let other = store.clone();
        store.save("b", vec![]).unwrap();
        store.save("a", vec![]).unwrap();
        assert_eq!(other.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }
}
