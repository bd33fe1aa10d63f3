use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collection::Position;
use crate::entity::{Entity, Patch};

use super::ErrorKind;

/// Identifier of one optimistic mutation (distinct from the entity id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationId(String);

impl MutationId {
    /// A fresh random id.
    pub fn new() -> Self {
        MutationId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MutationId {
    fn from(id: &str) -> Self {
        MutationId(id.to_string())
    }
}

impl From<String> for MutationId {
    fn from(id: String) -> Self {
        MutationId(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        })
    }
}

/// The optimistic change itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum MutationOp<E> {
    Create(E),
    Update(Patch),
    Delete,
}

impl<E> MutationOp<E> {
    pub fn kind(&self) -> MutationKind {
        match self {
            MutationOp::Create(_) => MutationKind::Create,
            MutationOp::Update(_) => MutationKind::Update,
            MutationOp::Delete => MutationKind::Delete,
        }
    }
}

/// A request to apply one mutation optimistically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRequest<E> {
    pub mutation_id: MutationId,
    pub target_id: String,
    pub op: MutationOp<E>,
    /// Placement for creates; `None` uses the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl<E: Entity> MutationRequest<E> {
    pub fn create(entity: E) -> Self {
        Self {
            mutation_id: MutationId::new(),
            target_id: entity.id().to_string(),
            op: MutationOp::Create(entity),
            position: None,
        }
    }

    pub fn update(target_id: impl Into<String>, patch: Patch) -> Self {
        Self {
            mutation_id: MutationId::new(),
            target_id: target_id.into(),
            op: MutationOp::Update(patch),
            position: None,
        }
    }

    pub fn delete(target_id: impl Into<String>) -> Self {
        Self {
            mutation_id: MutationId::new(),
            target_id: target_id.into(),
            op: MutationOp::Delete,
            position: None,
        }
    }

    /// Use a caller-chosen mutation id instead of a random one.
    pub fn with_id(mut self, mutation_id: impl Into<MutationId>) -> Self {
        self.mutation_id = mutation_id.into();
        self
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn kind(&self) -> MutationKind {
        self.op.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

/// The result of the backing request for a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationResolution {
    pub mutation_id: MutationId,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl MutationResolution {
    pub fn success(mutation_id: impl Into<MutationId>) -> Self {
        Self {
            mutation_id: mutation_id.into(),
            outcome: Outcome::Success,
            error: None,
        }
    }

    pub fn failure(mutation_id: impl Into<MutationId>, error: Option<ErrorKind>) -> Self {
        Self {
            mutation_id: mutation_id.into(),
            outcome: Outcome::Failure,
            error,
        }
    }
}
