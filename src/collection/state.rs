use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entity::Entity;

/// The last transition applied to a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    /// The whole collection was replaced (full fetch, restore, or reset).
    Replaced,
    Inserted { id: String },
    Updated { id: String },
    Removed { id: String },
}

impl Change {
    /// The entity this change is scoped to, if any.
    pub fn id(&self) -> Option<&str> {
        match self {
            Change::Replaced => None,
            Change::Inserted { id } | Change::Updated { id } | Change::Removed { id } => Some(id),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Change::Replaced => "replaced",
            Change::Inserted { .. } => "inserted",
            Change::Updated { .. } => "updated",
            Change::Removed { .. } => "removed",
        }
    }

    /// Whether this change may have touched the entity with `id`.
    pub fn touches(&self, id: &str) -> bool {
        self.id().map_or(true, |changed| changed == id)
    }
}

/// Read-only view of a collection, handed to selectors.
///
/// Entities are kept in caller-specified order; `index` maps every id to its
/// position in `entities`.
#[derive(Debug, Clone)]
pub struct CollectionState<E> {
    pub(super) entities: Vec<E>,
    pub(super) index: HashMap<String, usize>,
    pub(super) revision: u64,
    pub(super) last_change: Option<Change>,
}

impl<E> Default for CollectionState<E> {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            index: HashMap::new(),
            revision: 0,
            last_change: None,
        }
    }
}

impl<E: Entity> CollectionState<E> {
    pub fn get(&self, id: &str) -> Option<&E> {
        self.index.get(id).map(|&pos| &self.entities[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.entities.iter()
    }

    pub fn as_slice(&self) -> &[E] {
        &self.entities
    }

    pub fn to_vec(&self) -> Vec<E> {
        self.entities.clone()
    }

    /// Entities matching `predicate`, in stored order.
    pub fn filter<F>(&self, predicate: F) -> Vec<&E>
    where
        F: Fn(&E) -> bool,
    {
        self.entities.iter().filter(|e| predicate(e)).collect()
    }

    /// A sorted read snapshot. Stored order is left untouched.
    pub fn sorted_by<F>(&self, compare: F) -> Vec<&E>
    where
        F: FnMut(&&E, &&E) -> Ordering,
    {
        let mut view: Vec<&E> = self.entities.iter().collect();
        view.sort_by(compare);
        view
    }

    /// Number of transitions applied since the store was created.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn last_change(&self) -> Option<&Change> {
        self.last_change.as_ref()
    }

    /// Rebuild index entries for every position from `from` onwards.
    pub(super) fn reindex_from(&mut self, from: usize) {
        for (pos, entity) in self.entities.iter().enumerate().skip(from) {
            self.index.insert(entity.id().to_string(), pos);
        }
    }

    #[cfg(test)]
    pub(super) fn assert_consistent(&self) {
        assert_eq!(self.index.len(), self.entities.len(), "index size mismatch");
        for (id, &pos) in &self.index {
            assert_eq!(self.entities[pos].id(), id, "index points at wrong entity");
        }
    }
}
