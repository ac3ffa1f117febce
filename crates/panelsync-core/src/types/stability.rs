//! Stability wait parameters.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Parameters for a bounded "wait until the file stops changing" check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilityPolicy {
    /// How long the size must stay unchanged.
    pub dwell: Duration,
    /// Interval between size observations.
    pub poll: Duration,
    /// Upper bound on the whole wait.
    pub timeout: Duration,
}

impl StabilityPolicy {
    pub const fn new(dwell: Duration, poll: Duration, timeout: Duration) -> Self {
        Self {
            dwell,
            poll,
            timeout,
        }
    }

    pub const fn from_millis(dwell_ms: u64, poll_ms: u64, timeout_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(dwell_ms),
            Duration::from_millis(poll_ms),
            Duration::from_millis(timeout_ms),
        )
    }

    /// Policy used for job files and artifacts on the consumer side.
    pub const fn consumer_default() -> Self {
        Self::from_millis(600, 150, 8000)
    }

    /// Same policy with the overall wait clamped to `limit`.
    pub fn capped(self, limit: Duration) -> Self {
        Self {
            timeout: self.timeout.min(limit),
            ..self
        }
    }

    /// Policy used when locating the newest published artifact.
    pub const fn latest_artifact() -> Self {
        Self::from_millis(500, 150, 8000)
    }
}

impl Default for StabilityPolicy {
    fn default() -> Self {
        Self::consumer_default()
    }
}
