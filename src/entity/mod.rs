//! Entities - typed domain records tracked by a collection.
//!
//! Any serde-serializable struct with a string identifier can be managed by a
//! [`CollectionStore`](crate::CollectionStore). Field-level partial updates are
//! expressed as a [`Patch`].
//!
//! ## Example
//!
//! ```ignore
//! use optimistic_rust::Entity;
//!
//! #[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Entity)]
//! #[entity(collection = "reservations")]
//! struct Reservation {
//!     #[entity(id)]
//!     pub id: String,
//!     pub court: String,
//! }
//! ```

mod patch;

use serde::{de::DeserializeOwned, Serialize};

pub use patch::Patch;

/// Trait for records that can live in a collection.
pub trait Entity: Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + 'static {
    /// The collection name for this entity type (e.g., "reservations", "clients").
    const COLLECTION: &'static str;

    /// Returns the unique identifier for this entity instance.
    fn id(&self) -> &str;
}
