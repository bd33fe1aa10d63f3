//! Optimistic mutation coordination for client-side entity collections.
//!
//! Mutations are applied locally before the backing request finishes, and
//! undone exactly if it fails or times out. Observers subscribe to slices of
//! a collection and are told only when their slice changes.

mod cache;
mod collection;
mod config;
mod coordinator;
#[cfg(feature = "emitter")]
mod emitter;
mod entity;
mod mutation;
mod notify;
mod persist;
mod session;

pub use cache::{CacheEntry, CacheLayer, Clock, KeyPattern, ManualClock, SystemClock};
pub use collection::{Change, CollectionError, CollectionState, CollectionStore, Position};
pub use config::CoordinatorConfig;
pub use coordinator::{DataService, OptimisticCollection, ServiceError};
pub use entity::{Entity, Patch};
pub use mutation::{
    ErrorKind, MutationError, MutationId, MutationKind, MutationOp, MutationRequest,
    MutationResolution, MutationState, MutationTracker, Outcome, PendingMutation, Prior,
};
pub use notify::{StateChangeNotifier, Subscription};
pub use persist::{CollectionSnapshot, InMemoryPersistedStore, PersistError, PersistedStore};
pub use session::{NamedCache, Resettable, Session, SessionError};

#[cfg(feature = "emitter")]
pub use emitter::{ChangeEmitter, ChangeEvent};

// Derive macro for `Entity`.
pub use optimistic_rust_macros::Entity;
