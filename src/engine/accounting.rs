//! Timer and pool accounting.
//!
//! The engine owns one [`TimerState`] per configured timer plus the shared
//! [`PoolState`]. It has no clock of its own: the caller drives it by
//! invoking [`AccountingEngine::tick`] once per elapsed second.
//!
//! ## Timer states
//!
//! ```text
//! Idle --start--> Running --stop--> Idle
//! ```
//!
//! While running, each tick adds one second. Any second that lands past the
//! timer's limit is debited from the pool. One-shot jumps (`manual_adjust`,
//! `jump_time`) charge `new - max(limit, old)` so time that was already
//! overflowing is never charged twice.
//!
//! Every operation validates before it mutates, so an `Err` leaves the
//! engine untouched.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::{Access, DayView, EngineError, PoolView, TimerSpec, TimerTable, TimerView};
use crate::state::{PoolState, Snapshot, TimerState};

#[derive(Debug, Clone)]
pub struct AccountingEngine {
    table: TimerTable,
    /// Seconds credited to the pool at the start of each day
    daily_allowance: u64,
    timers: BTreeMap<String, TimerState>,
    pool: PoolState,
}

impl AccountingEngine {
    /// Create an engine holding a fresh day
    pub fn new(table: TimerTable, daily_allowance: u64) -> Self {
        let mut engine = Self {
            table,
            daily_allowance,
            timers: BTreeMap::new(),
            pool: PoolState::default(),
        };
        engine.open_day();
        engine
    }

    fn open_day(&mut self) {
        self.timers = self
            .table
            .iter()
            .map(|spec| (spec.id.clone(), TimerState::new()))
            .collect();
        self.pool = PoolState::opening(self.daily_allowance);
    }

    fn spec_of(&self, id: &str) -> Result<&TimerSpec, EngineError> {
        self.table
            .get(id)
            .ok_or_else(|| EngineError::InvalidTimer(id.to_string()))
    }

    fn state_mut(&mut self, id: &str) -> Result<&mut TimerState, EngineError> {
        self.timers
            .get_mut(id)
            .ok_or_else(|| EngineError::InvalidTimer(id.to_string()))
    }

    /// Put a timer into the running state. Starting a running timer is a no-op.
    pub fn start(&mut self, access: Access, id: &str) -> Result<(), EngineError> {
        access.require("start")?;
        let state = self.state_mut(id)?;
        if !state.running {
            state.running = true;
            debug!("Timer {} started at {}s", id, state.elapsed);
        }
        Ok(())
    }

    /// Put a timer into the idle state. Stopping an idle timer is a no-op.
    pub fn stop(&mut self, access: Access, id: &str) -> Result<(), EngineError> {
        access.require("stop")?;
        let state = self.state_mut(id)?;
        if state.running {
            state.running = false;
            debug!("Timer {} stopped at {}s", id, state.elapsed);
        }
        Ok(())
    }

    /// Advance every running timer by one second.
    ///
    /// Each running timer past its limit debits the pool by one on its own,
    /// so N overflowing timers cost N seconds per tick.
    pub fn tick(&mut self, access: Access) -> Result<(), EngineError> {
        access.require("tick")?;
        for spec in self.table.iter() {
            let Some(state) = self.timers.get_mut(&spec.id) else {
                continue;
            };
            if !state.running {
                continue;
            }
            state.elapsed = state.elapsed.saturating_add(1);
            if state.elapsed > spec.limit {
                self.pool.debit(1);
            }
        }
        Ok(())
    }

    /// Zero an overflowing timer, consuming one restart.
    pub fn restart(&mut self, access: Access, id: &str) -> Result<TimerState, EngineError> {
        access.require("restart")?;
        let spec = self.spec_of(id)?;
        let (limit, quota) = (spec.limit, spec.max_restarts);

        let state = self.state_mut(id)?;
        if !state.in_overflow(limit) {
            return Err(EngineError::NotInOverflow {
                id: id.to_string(),
                elapsed: state.elapsed,
                limit,
            });
        }
        if !quota.allows(state.restarts_used) {
            let max = Option::<u32>::from(quota).unwrap_or(u32::MAX);
            return Err(EngineError::RestartQuotaExceeded { id: id.to_string(), max });
        }

        state.elapsed = 0;
        state.restarts_used = state.restarts_used.saturating_add(1);
        Ok(*state)
    }

    /// Shift a timer's elapsed time by `delta_seconds`, never below zero.
    ///
    /// Returns the seconds debited from the pool.
    pub fn manual_adjust(
        &mut self,
        access: Access,
        id: &str,
        delta_seconds: i64,
    ) -> Result<u64, EngineError> {
        access.require("adjust")?;
        self.shift(id, delta_seconds)
    }

    /// Jump a timer forward by whole minutes.
    ///
    /// Returns the seconds debited from the pool.
    pub fn jump_time(&mut self, access: Access, id: &str, minutes: i64) -> Result<u64, EngineError> {
        access.require("jump")?;
        self.shift(id, minutes.saturating_mul(60))
    }

    fn shift(&mut self, id: &str, delta: i64) -> Result<u64, EngineError> {
        let limit = self.spec_of(id)?.limit;
        let state = self
            .timers
            .get_mut(id)
            .ok_or_else(|| EngineError::InvalidTimer(id.to_string()))?;

        let before = state.elapsed;
        let after = before.saturating_add_signed(delta);
        let charged = if delta > 0 && after > limit {
            after - limit.max(before)
        } else {
            0
        };

        state.elapsed = after;
        self.pool.debit(charged);
        debug!("Timer {} shifted {}s -> {}s, charged {}s", id, before, after, charged);
        Ok(charged)
    }

    /// Replace every timer and the pool with a fresh day.
    pub fn reset_day(&mut self, access: Access) -> Result<(), EngineError> {
        access.require("reset")?;
        self.open_day();
        Ok(())
    }

    /// Load timer and pool state from a snapshot.
    ///
    /// Entries for timers that are not configured are dropped; configured
    /// timers absent from the snapshot start fresh.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        for id in snapshot.timers.keys() {
            if self.table.get(id).is_none() {
                warn!("Dropping state for unknown timer '{}'", id);
            }
        }
        self.timers = self
            .table
            .iter()
            .map(|spec| {
                let state = snapshot.timers.get(&spec.id).copied().unwrap_or_default();
                (spec.id.clone(), state)
            })
            .collect();
        self.pool = snapshot.pool;
    }

    pub fn snapshot(&self, revision: u64, day: Option<NaiveDate>) -> Snapshot {
        Snapshot {
            revision,
            day,
            pool: self.pool,
            timers: self.timers.clone(),
        }
    }

    pub fn any_running(&self) -> bool {
        self.timers.values().any(TimerState::is_running)
    }

    pub fn timer(&self, id: &str) -> Option<&TimerState> {
        self.timers.get(id)
    }

    pub fn pool(&self) -> PoolState {
        self.pool
    }

    pub fn table(&self) -> &TimerTable {
        &self.table
    }

    pub fn daily_allowance(&self) -> u64 {
        self.daily_allowance
    }

    pub fn timer_view(&self, id: &str) -> Option<TimerView> {
        let spec = self.table.get(id)?;
        let state = self.timers.get(id)?;
        Some(TimerView::new(spec, state))
    }

    /// Presentation rows in configuration order
    pub fn views(&self) -> Vec<TimerView> {
        self.table
            .iter()
            .filter_map(|spec| self.timers.get(&spec.id).map(|state| TimerView::new(spec, state)))
            .collect()
    }

    pub fn pool_view(&self) -> PoolView {
        PoolView::from(self.pool)
    }

    pub fn day_view(&self, revision: u64, day: Option<NaiveDate>) -> DayView {
        DayView {
            revision,
            day,
            pool: self.pool_view(),
            timers: self.views(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RestartQuota;

    const ADMIN: Access = Access::Admin;
    const ALLOWANCE: u64 = 210 * 60;

    fn engine() -> AccountingEngine {
        let table = TimerTable::new(vec![
            TimerSpec::new("food", 900, RestartQuota::Limited(3)),
            TimerSpec::new("bath", 1800, RestartQuota::Unlimited),
            TimerSpec::new("fun", 60, RestartQuota::Limited(0)),
        ])
        .unwrap();
        AccountingEngine::new(table, ALLOWANCE)
    }

    fn balance(engine: &AccountingEngine) -> i64 {
        engine.pool().balance
    }

    #[test]
    fn start_and_stop_toggle_running() {
        let mut engine = engine();
        engine.start(ADMIN, "food").unwrap();
        assert!(engine.timer("food").unwrap().running);
        engine.start(ADMIN, "food").unwrap();
        assert!(engine.timer("food").unwrap().running);
        engine.stop(ADMIN, "food").unwrap();
        assert!(!engine.timer("food").unwrap().running);
        engine.stop(ADMIN, "food").unwrap();
        assert!(!engine.timer("food").unwrap().running);
    }

    #[test]
    fn unknown_timer_is_rejected() {
        let mut engine = engine();
        let err = EngineError::InvalidTimer("nap".into());
        assert_eq!(engine.start(ADMIN, "nap"), Err(err.clone()));
        assert_eq!(engine.stop(ADMIN, "nap"), Err(err.clone()));
        assert_eq!(engine.restart(ADMIN, "nap"), Err(err.clone()));
        assert_eq!(engine.manual_adjust(ADMIN, "nap", 5), Err(err.clone()));
        assert_eq!(engine.jump_time(ADMIN, "nap", 5), Err(err));
    }

    #[test]
    fn read_only_access_cannot_mutate() {
        let mut engine = engine();
        let before = engine.snapshot(0, None);
        let ro = Access::ReadOnly;
        assert_eq!(engine.start(ro, "food"), Err(EngineError::PermissionDenied("start")));
        assert_eq!(engine.stop(ro, "food"), Err(EngineError::PermissionDenied("stop")));
        assert_eq!(engine.tick(ro), Err(EngineError::PermissionDenied("tick")));
        assert_eq!(engine.restart(ro, "food"), Err(EngineError::PermissionDenied("restart")));
        assert_eq!(
            engine.manual_adjust(ro, "food", 10),
            Err(EngineError::PermissionDenied("adjust"))
        );
        assert_eq!(engine.jump_time(ro, "food", 30), Err(EngineError::PermissionDenied("jump")));
        assert_eq!(engine.reset_day(ro), Err(EngineError::PermissionDenied("reset")));
        assert_eq!(engine.snapshot(0, None), before);
    }

    #[test]
    fn tick_only_advances_running_timers() {
        let mut engine = engine();
        engine.start(ADMIN, "food").unwrap();
        engine.tick(ADMIN).unwrap();
        engine.tick(ADMIN).unwrap();
        assert_eq!(engine.timer("food").unwrap().elapsed, 2);
        assert_eq!(engine.timer("bath").unwrap().elapsed, 0);
        assert_eq!(balance(&engine), ALLOWANCE as i64);
    }

    #[test]
    fn first_second_past_limit_costs_one() {
        let mut engine = engine();
        engine.start(ADMIN, "food").unwrap();
        for _ in 0..901 {
            engine.tick(ADMIN).unwrap();
        }
        assert_eq!(engine.timer("food").unwrap().elapsed, 901);
        assert_eq!(balance(&engine), ALLOWANCE as i64 - 1);
    }

    #[test]
    fn each_overflowing_timer_debits_independently() {
        let mut engine = engine();
        engine.manual_adjust(ADMIN, "food", 900).unwrap();
        engine.manual_adjust(ADMIN, "bath", 1800).unwrap();
        engine.manual_adjust(ADMIN, "fun", 60).unwrap();
        for id in ["food", "bath", "fun"] {
            engine.start(ADMIN, id).unwrap();
        }
        let opening = balance(&engine);

        engine.tick(ADMIN).unwrap();
        assert_eq!(balance(&engine), opening - 3);

        engine.stop(ADMIN, "bath").unwrap();
        engine.tick(ADMIN).unwrap();
        assert_eq!(balance(&engine), opening - 5);
    }

    #[test]
    fn jump_from_zero_charges_only_past_limit() {
        let mut engine = engine();
        let charged = engine.jump_time(ADMIN, "food", 20).unwrap();
        assert_eq!(charged, 20 * 60 - 900);
        assert_eq!(engine.timer("food").unwrap().elapsed, 1200);
        assert_eq!(balance(&engine), ALLOWANCE as i64 - 300);
    }

    #[test]
    fn jump_while_overflowing_charges_everything_added() {
        let mut engine = engine();
        engine.jump_time(ADMIN, "food", 16).unwrap();
        let before = balance(&engine);
        let charged = engine.jump_time(ADMIN, "food", 5).unwrap();
        assert_eq!(charged, 300);
        assert_eq!(balance(&engine), before - 300);
        assert_eq!(engine.timer("food").unwrap().elapsed, 21 * 60);
    }

    #[test]
    fn jump_within_limit_is_free() {
        let mut engine = engine();
        assert_eq!(engine.jump_time(ADMIN, "food", 15).unwrap(), 0);
        assert_eq!(balance(&engine), ALLOWANCE as i64);
    }

    #[test]
    fn negative_jump_clamps_at_zero_without_credit() {
        let mut engine = engine();
        engine.jump_time(ADMIN, "fun", 2).unwrap();
        let before = balance(&engine);
        assert_eq!(engine.jump_time(ADMIN, "fun", -10).unwrap(), 0);
        assert_eq!(engine.timer("fun").unwrap().elapsed, 0);
        assert_eq!(balance(&engine), before);
    }

    #[test]
    fn manual_adjust_clamps_at_zero() {
        let mut engine = engine();
        engine.manual_adjust(ADMIN, "food", 30).unwrap();
        engine.manual_adjust(ADMIN, "food", -50).unwrap();
        assert_eq!(engine.timer("food").unwrap().elapsed, 0);
    }

    #[test]
    fn manual_adjust_uses_jump_overflow_formula() {
        let mut engine = engine();
        engine.manual_adjust(ADMIN, "food", 850).unwrap();
        let charged = engine.manual_adjust(ADMIN, "food", 100).unwrap();
        assert_eq!(charged, 50);
        assert_eq!(balance(&engine), ALLOWANCE as i64 - 50);
    }

    #[test]
    fn elapsed_survives_extreme_adjustments() {
        let mut engine = engine();
        engine.manual_adjust(ADMIN, "bath", i64::MIN).unwrap();
        assert_eq!(engine.timer("bath").unwrap().elapsed, 0);
        engine.jump_time(ADMIN, "bath", i64::MAX).unwrap();
        assert!(engine.timer("bath").unwrap().elapsed > 1800);
        engine.manual_adjust(ADMIN, "bath", -1).unwrap();
    }

    #[test]
    fn restart_requires_overflow_regardless_of_quota() {
        let mut engine = engine();
        engine.manual_adjust(ADMIN, "food", 900).unwrap();
        assert_eq!(
            engine.restart(ADMIN, "food"),
            Err(EngineError::NotInOverflow { id: "food".into(), elapsed: 900, limit: 900 })
        );
        // Exhausted quota still reports NotInOverflow first.
        assert!(matches!(
            engine.restart(ADMIN, "fun"),
            Err(EngineError::NotInOverflow { .. })
        ));
    }

    #[test]
    fn restart_zeroes_and_keeps_running() {
        let mut engine = engine();
        engine.start(ADMIN, "food").unwrap();
        engine.manual_adjust(ADMIN, "food", 950).unwrap();
        let balance_before = balance(&engine);
        let state = engine.restart(ADMIN, "food").unwrap();
        assert_eq!(state, TimerState { elapsed: 0, running: true, restarts_used: 1 });
        assert_eq!(balance(&engine), balance_before);
    }

    #[test]
    fn restart_quota_is_enforced() {
        let mut engine = engine();
        for _ in 0..3 {
            engine.manual_adjust(ADMIN, "food", 901).unwrap();
            engine.restart(ADMIN, "food").unwrap();
        }
        engine.manual_adjust(ADMIN, "food", 901).unwrap();
        assert_eq!(
            engine.restart(ADMIN, "food"),
            Err(EngineError::RestartQuotaExceeded { id: "food".into(), max: 3 })
        );
        assert_eq!(engine.timer("food").unwrap().elapsed, 901);

        engine.manual_adjust(ADMIN, "fun", 61).unwrap();
        assert_eq!(
            engine.restart(ADMIN, "fun"),
            Err(EngineError::RestartQuotaExceeded { id: "fun".into(), max: 0 })
        );
    }

    #[test]
    fn unlimited_quota_never_runs_out() {
        let mut engine = engine();
        for _ in 0..50 {
            engine.manual_adjust(ADMIN, "bath", 1801).unwrap();
            engine.restart(ADMIN, "bath").unwrap();
        }
        assert_eq!(engine.timer("bath").unwrap().restarts_used, 50);
    }

    #[test]
    fn reset_day_restores_defaults() {
        let mut engine = engine();
        engine.start(ADMIN, "food").unwrap();
        engine.jump_time(ADMIN, "food", 30).unwrap();
        engine.restart(ADMIN, "food").unwrap();
        engine.reset_day(ADMIN).unwrap();

        assert_eq!(balance(&engine), ALLOWANCE as i64);
        for view in engine.views() {
            assert_eq!(view.elapsed, 0);
            assert!(!view.running);
            assert_eq!(view.restarts_used, 0);
        }
    }

    #[test]
    fn restore_drops_unknown_and_fills_missing() {
        let mut engine = engine();
        let mut snapshot = Snapshot::default();
        snapshot.pool.balance = -42;
        snapshot.timers.insert(
            "food".into(),
            TimerState { elapsed: 1000, running: true, restarts_used: 2 },
        );
        snapshot.timers.insert("ghost".into(), TimerState::new());

        engine.restore(&snapshot);
        assert_eq!(balance(&engine), -42);
        assert_eq!(engine.timer("food").unwrap().restarts_used, 2);
        assert_eq!(engine.timer("bath"), Some(&TimerState::new()));
        assert!(engine.timer("ghost").is_none());
    }

    #[test]
    fn views_follow_table_order() {
        let engine = engine();
        let ids: Vec<_> = engine.views().into_iter().map(|v| v.id).collect();
        assert_eq!(ids, vec!["food", "bath", "fun"]);
    }
}
