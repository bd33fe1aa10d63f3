use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::collection::CollectionError;

use super::Entity;

/// A set of field overrides applied to an entity by shallow merge.
///
/// Each field replaces the same-named top-level field of the entity; nested
/// objects are replaced wholesale, never merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch {
    fields: Map<String, Value>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any earlier value for the same field.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Build a patch from a JSON object. Returns `None` for any other JSON value.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Merge this patch into `entity`, producing the updated value.
    ///
    /// The identifier check is left to the caller; this only validates that
    /// the merged fields still deserialize into `E`.
    pub(crate) fn apply<E: Entity>(&self, entity: &E) -> Result<E, CollectionError> {
        let invalid = |reason: String| CollectionError::InvalidPatch {
            collection: E::COLLECTION,
            id: entity.id().to_string(),
            reason,
        };

        let mut value = serde_json::to_value(entity).map_err(|e| invalid(e.to_string()))?;
        let Value::Object(target) = &mut value else {
            return Err(invalid("entity does not serialize to an object".into()));
        };

        for (field, field_value) in &self.fields {
            target.insert(field.clone(), field_value.clone());
        }

        serde_json::from_value(value).map_err(|e| invalid(e.to_string()))
    }
}

/// Build a [`Patch`] from `field => value` pairs.
///
/// ```ignore
/// let patch = patch! { "status" => "approved", "paid" => true };
/// ```
#[macro_export]
macro_rules! patch {
    ($($field:expr => $value:expr),* $(,)?) => {
        $crate::Patch::new()$(.set($field, $value))*
    };
}
