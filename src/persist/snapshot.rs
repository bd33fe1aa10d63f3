use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;

use super::PersistError;

/// Point-in-time copy of a collection's entities, in stored order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSnapshot<E> {
    pub collection: String,
    pub revision: u64,
    pub entities: Vec<E>,
}

impl<E: Entity> CollectionSnapshot<E> {
    pub fn new(revision: u64, entities: Vec<E>) -> Self {
        Self {
            collection: E::COLLECTION.to_string(),
            revision,
            entities,
        }
    }

    /// Binary form (bitcode).
    ///
    /// Entities holding self-describing values such as `serde_json::Value`
    /// cannot be encoded this way.
    pub fn encode(&self) -> Result<Vec<u8>, PersistError> {
        bitcode::serialize(self).map_err(|e| PersistError::Encode {
            collection: E::COLLECTION,
            message: e.to_string(),
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PersistError> {
        let snapshot: Self = bitcode::deserialize(bytes).map_err(|e| PersistError::Decode {
            collection: E::COLLECTION,
            message: e.to_string(),
        })?;
        if snapshot.collection != E::COLLECTION {
            return Err(PersistError::WrongCollection {
                expected: E::COLLECTION,
                found: snapshot.collection,
            });
        }
        Ok(snapshot)
    }

    /// Text form for backends that only store strings.
    pub fn to_base64(&self) -> Result<String, PersistError> {
        Ok(STANDARD.encode(self.encode()?))
    }

    pub fn from_base64(text: &str) -> Result<Self, PersistError> {
        let bytes = STANDARD.decode(text).map_err(|e| PersistError::Decode {
            collection: E::COLLECTION,
            message: e.to_string(),
        })?;
        Self::decode(&bytes)
    }
}
