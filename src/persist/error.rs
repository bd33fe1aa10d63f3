use thiserror::Error;

use crate::collection::CollectionError;

/// Error type for snapshot persistence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistError {
    #[error("failed to encode {collection} snapshot: {message}")]
    Encode {
        collection: &'static str,
        message: String,
    },
    #[error("failed to decode {collection} snapshot: {message}")]
    Decode {
        collection: &'static str,
        message: String,
    },
    /// A stored snapshot belongs to a different collection.
    #[error("snapshot is for collection {found}, expected {expected}")]
    WrongCollection {
        expected: &'static str,
        found: String,
    },
    #[error(transparent)]
    Collection(#[from] CollectionError),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("persisted store lock poisoned during {0}")]
    LockPoisoned(&'static str),
}
