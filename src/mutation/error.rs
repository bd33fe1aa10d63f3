use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collection::CollectionError;

use super::{MutationId, MutationState};

/// Error type for optimistic mutation operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    /// A create targeted an id that already exists.
    #[error("conflict: {collection}:{target_id} already exists")]
    Conflict {
        collection: &'static str,
        target_id: String,
    },
    /// An update or delete targeted an id that does not exist.
    #[error("not found: {collection}:{target_id}")]
    NotFound {
        collection: &'static str,
        target_id: String,
    },
    /// Another mutation on the same target has not resolved yet.
    #[error("{collection}:{target_id} already has mutation {pending} in flight")]
    ConcurrentMutation {
        collection: &'static str,
        target_id: String,
        pending: MutationId,
    },
    /// The mutation is not in the applied state (already resolved or unknown).
    #[error("mutation {mutation_id} is not pending ({})", describe(.state))]
    StaleMutation {
        mutation_id: MutationId,
        state: Option<MutationState>,
    },
    /// The mutation id is already in use.
    #[error("mutation id {mutation_id} already used")]
    DuplicateMutationId { mutation_id: MutationId },
    /// The backing request did not answer in time; the mutation was rolled back.
    #[error("mutation {mutation_id} timed out after {after:?} and was rolled back")]
    Timeout {
        mutation_id: MutationId,
        after: Duration,
    },
    /// The backing request failed; the mutation was rolled back.
    #[error("mutation {mutation_id} rejected and rolled back: {reason}")]
    Rejected {
        mutation_id: MutationId,
        reason: String,
    },
    #[error(transparent)]
    Collection(#[from] CollectionError),
    #[error("collection lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

fn describe(state: &Option<MutationState>) -> String {
    match state {
        Some(state) => state.to_string(),
        None => "unknown".to_string(),
    }
}

/// Flat error taxonomy carried in a [`MutationResolution`](super::MutationResolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DuplicateId,
    NotFound,
    Conflict,
    ConcurrentMutation,
    StaleMutation,
    Timeout,
    Rejected,
    InvalidEntity,
    Internal,
}

impl MutationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MutationError::Conflict { .. } => ErrorKind::Conflict,
            MutationError::NotFound { .. } => ErrorKind::NotFound,
            MutationError::ConcurrentMutation { .. } => ErrorKind::ConcurrentMutation,
            MutationError::StaleMutation { .. } => ErrorKind::StaleMutation,
            MutationError::DuplicateMutationId { .. } => ErrorKind::Conflict,
            MutationError::Timeout { .. } => ErrorKind::Timeout,
            MutationError::Rejected { .. } => ErrorKind::Rejected,
            MutationError::Collection(err) => match err {
                CollectionError::DuplicateId { .. } => ErrorKind::DuplicateId,
                CollectionError::NotFound { .. } => ErrorKind::NotFound,
                CollectionError::IdentifierChanged { .. }
                | CollectionError::InvalidEntity { .. }
                | CollectionError::InvalidPatch { .. } => ErrorKind::InvalidEntity,
            },
            MutationError::LockPoisoned(_) => ErrorKind::Internal,
        }
    }
}
