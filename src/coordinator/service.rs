use async_trait::async_trait;
use thiserror::Error;

use crate::entity::Entity;
use crate::mutation::MutationRequest;

/// Failure reported by the backing data service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub message: String,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The remote side of a mutation: performs the real create/update/delete.
///
/// Implementations should not touch the collection; the coordinator commits
/// or rolls back based on the returned result.
#[async_trait]
pub trait DataService<E: Entity>: Send + Sync {
    async fn execute(&self, request: &MutationRequest<E>) -> Result<(), ServiceError>;
}
