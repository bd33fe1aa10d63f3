//! Coordinator - ties a collection, its mutation tracker, and the backing
//! data service together.
//!
//! ```ignore
//! let reservations = OptimisticCollection::<Reservation>::default();
//! reservations.replace_all(fetched)?;
//!
//! let request = MutationRequest::update("r1", patch! { "status" => "approved" });
//! reservations.dispatch(&api, request).await?;
//! ```

mod collection;
mod queue;
mod service;

pub use collection::OptimisticCollection;
pub use service::{DataService, ServiceError};
