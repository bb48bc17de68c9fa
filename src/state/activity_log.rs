//! Bounded feed of committed operations

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub timer: Option<String>,
    pub detail: Option<String>,
}

/// Most recent entries first; the oldest fall off once `capacity` is reached.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, action: &str, timer: Option<&str>, detail: Option<String>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(ActivityEntry {
            timestamp: Utc::now(),
            action: action.to_string(),
            timer: timer.map(str::to_string),
            detail,
        });
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&ActivityEntry> {
        self.entries.front()
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(200)
    }
}
