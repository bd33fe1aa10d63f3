//! Mutations - optimistic apply, commit, and rollback against one collection.
//!
//! Each mutation moves through `Applied -> Committed` when its backing request
//! succeeds, or `Applied -> RolledBack` when it fails or times out. Resolving a
//! mutation that is no longer applied is a no-op reported as
//! [`MutationError::StaleMutation`].

mod error;
mod request;
mod tracker;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use error::{ErrorKind, MutationError};
pub use request::{
    MutationId, MutationKind, MutationOp, MutationRequest, MutationResolution, Outcome,
};
pub use tracker::{MutationTracker, PendingMutation, Prior};

/// Lifecycle state of one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationState {
    Applied,
    Committed,
    RolledBack,
}

impl fmt::Display for MutationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MutationState::Applied => "applied",
            MutationState::Committed => "committed",
            MutationState::RolledBack => "rolled back",
        })
    }
}
