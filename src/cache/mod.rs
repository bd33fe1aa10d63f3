//! Cache - short-lived memoization of derived or fetched values.
//!
//! Misses are never errors: every cached value must be recomputable from the
//! collection or refetchable from the data service.

mod clock;
mod layer;
mod pattern;

pub use clock::{Clock, ManualClock, SystemClock};
pub use layer::{CacheEntry, CacheLayer};
pub use pattern::KeyPattern;
