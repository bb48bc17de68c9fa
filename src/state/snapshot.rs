//! Persisted snapshot of the engine

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{PoolState, TimerState};

/// Everything the sync layer stores: the pool, every timer, and bookkeeping
/// used to order snapshots between processes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Bumped on every committed mutation
    #[serde(default)]
    pub revision: u64,
    /// Operational day this state belongs to
    #[serde(default)]
    pub day: Option<NaiveDate>,
    pub pool: PoolState,
    pub timers: BTreeMap<String, TimerState>,
}

impl Snapshot {
    /// Check whether this snapshot supersedes one at `revision`
    pub fn is_newer_than(&self, revision: u64) -> bool {
        self.revision > revision
    }
}
