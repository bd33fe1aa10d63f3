//! Session - the stores owned by one signed-in user, reset together on logout.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::cache::CacheLayer;
use crate::coordinator::OptimisticCollection;
use crate::entity::Entity;
use crate::mutation::MutationError;
use crate::persist::{PersistError, PersistedStore};

/// Something that holds per-session state.
pub trait Resettable: Send + Sync {
    /// Stable name; also the persisted-store key for collections.
    fn name(&self) -> &str;

    fn reset(&self) -> Result<(), MutationError>;
}

impl<E: Entity> Resettable for OptimisticCollection<E> {
    fn name(&self) -> &str {
        E::COLLECTION
    }

    fn reset(&self) -> Result<(), MutationError> {
        OptimisticCollection::reset(self)
    }
}

/// A named cache registered with a session.
pub struct NamedCache<V> {
    name: String,
    cache: CacheLayer<V>,
}

impl<V> NamedCache<V> {
    pub fn new(name: impl Into<String>, cache: CacheLayer<V>) -> Self {
        Self {
            name: name.into(),
            cache,
        }
    }
}

impl<V: Clone + Send + Sync> Resettable for NamedCache<V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&self) -> Result<(), MutationError> {
        self.cache.clear();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("failed to reset {name}: {source}")]
    Reset { name: String, source: MutationError },
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Explicit registry of session stores.
#[derive(Default)]
pub struct Session {
    members: Vec<Box<dyn Resettable>>,
    persisted: Option<Arc<dyn PersistedStore>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also drop each member's persisted snapshot on reset.
    pub fn with_persisted(mut self, store: Arc<dyn PersistedStore>) -> Self {
        self.persisted = Some(store);
        self
    }

    pub fn register(&mut self, member: impl Resettable + 'static) -> &mut Self {
        self.members.push(Box::new(member));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Reset every member in registration order.
    ///
    /// Every member is attempted; the first failure is returned.
    pub fn reset_all(&self) -> Result<(), SessionError> {
        let mut first_error = None;
        for member in &self.members {
            let result = member
                .reset()
                .map_err(|source| SessionError::Reset {
                    name: member.name().to_string(),
                    source,
                })
                .and_then(|()| match &self.persisted {
                    Some(store) => store.remove(member.name()).map(|_| ()).map_err(Into::into),
                    None => Ok(()),
                });
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        }
        debug!(members = self.members.len(), "session reset");
        first_error.map_or(Ok(()), Err)
    }
}
