use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collection::Position;

/// Tuning for a collection's mutation tracker and coordinator.
///
/// Deserializes from partial input; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// How long a backing request may run before the mutation is rolled back.
    pub default_timeout_ms: u64,
    /// How many resolved mutation ids are remembered for stale-resolution checks.
    pub resolved_history: usize,
    /// Where optimistic creates land when the request does not say.
    pub default_position: Position,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 10_000,
            resolved_history: 1024,
            default_position: Position::Start,
        }
    }
}

impl CoordinatorConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_resolved_history(mut self, capacity: usize) -> Self {
        self.resolved_history = capacity;
        self
    }

    pub fn with_default_position(mut self, position: Position) -> Self {
        self.default_position = position;
        self
    }
}
