//! Collections - ordered, indexed in-memory copies of one entity type.
//!
//! A [`CollectionStore`] is the authoritative client-side copy of a collection
//! (reservations, invoices, clients, ...). It keeps caller-chosen order,
//! O(1) lookup by id, and publishes every transition to its subscribers.

mod error;
mod state;
mod store;

use serde::{Deserialize, Serialize};

pub use error::CollectionError;
pub use state::{Change, CollectionState};
pub use store::CollectionStore;

/// Where a newly inserted entity is placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// Prepend ("most recent first").
    #[default]
    Start,
    /// Append.
    End,
}
