//! Read-only presentation rows built from engine state

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{RestartQuota, TimerSpec};
use crate::state::{PoolState, TimerState};
use crate::utils::{format_clock, format_signed};

/// One timer as a presenter renders it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    pub id: String,
    pub elapsed: u64,
    pub limit: u64,
    pub running: bool,
    pub restarts_used: u32,
    pub max_restarts: RestartQuota,
    pub overflow_seconds: u64,
    pub in_overflow: bool,
    /// Fraction of the limit used, capped at 1.0 for the gauge
    pub progress: f64,
    pub display: String,
}

impl TimerView {
    pub fn new(spec: &TimerSpec, state: &TimerState) -> Self {
        Self {
            id: spec.id.clone(),
            elapsed: state.elapsed,
            limit: spec.limit,
            running: state.running,
            restarts_used: state.restarts_used,
            max_restarts: spec.max_restarts,
            overflow_seconds: state.overflow(spec.limit),
            in_overflow: state.in_overflow(spec.limit),
            progress: (state.elapsed as f64 / spec.limit as f64).min(1.0),
            display: format_clock(i64::try_from(state.elapsed).unwrap_or(i64::MAX)),
        }
    }
}

/// The global pool as a presenter renders it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolView {
    pub balance: i64,
    pub overdrawn: bool,
    pub display: String,
}

impl From<PoolState> for PoolView {
    fn from(pool: PoolState) -> Self {
        Self {
            balance: pool.balance,
            overdrawn: pool.is_overdrawn(),
            display: format_signed(pool.balance),
        }
    }
}

/// Pool and every timer captured at one revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayView {
    pub revision: u64,
    pub day: Option<NaiveDate>,
    pub pool: PoolView,
    pub timers: Vec<TimerView>,
}

impl DayView {
    pub fn timer(&self, id: &str) -> Option<&TimerView> {
        self.timers.iter().find(|view| view.id == id)
    }
}
