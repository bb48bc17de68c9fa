//! Per-timer runtime record

use serde::{Deserialize, Serialize};

/// Mutable runtime state of a single break timer.
///
/// `elapsed` is a running counter in seconds and is never clamped to the
/// timer's limit; time past the limit is the overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub elapsed: u64,
    pub running: bool,
    #[serde(default)]
    pub restarts_used: u32,
}

impl TimerState {
    /// Create an idle timer with nothing elapsed
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the timer is running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Seconds spent past `limit`, zero while within it
    pub fn overflow(&self, limit: u64) -> u64 {
        self.elapsed.saturating_sub(limit)
    }

    /// Check if the timer has passed `limit`
    pub fn in_overflow(&self, limit: u64) -> bool {
        self.elapsed > limit
    }
}
