//! Persistence - snapshots of collection contents that survive a reload.
//!
//! A [`CollectionSnapshot`] is bitcode-encoded and stored under the
//! collection's name in a [`PersistedStore`]. Pending optimistic mutations
//! are not persisted; only the stored entities are.

mod error;
mod snapshot;
mod store;

pub use error::PersistError;
pub use snapshot::CollectionSnapshot;
pub use store::{InMemoryPersistedStore, PersistedStore};
