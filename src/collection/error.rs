use thiserror::Error;

/// Error type for collection store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    /// An entity with this id is already in the collection.
    #[error("duplicate id {collection}:{id}")]
    DuplicateId { collection: &'static str, id: String },
    /// No entity with this id is in the collection.
    #[error("entity not found: {collection}:{id}")]
    NotFound { collection: &'static str, id: String },
    /// A patch tried to rewrite the entity identifier.
    #[error("patch on {collection}:{id} would change its id to {new_id}")]
    IdentifierChanged {
        collection: &'static str,
        id: String,
        new_id: String,
    },
    /// The entity failed validation at the store boundary.
    #[error("invalid {collection} entity: {reason}")]
    InvalidEntity {
        collection: &'static str,
        reason: String,
    },
    /// The merged patch no longer forms a valid entity.
    #[error("patch on {collection}:{id} rejected: {reason}")]
    InvalidPatch {
        collection: &'static str,
        id: String,
        reason: String,
    },
}
