//! Authoritative clock for the accounting engine

use std::{sync::Arc, time::Duration};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::follower_task;
use crate::{engine::EngineError, state::AppState};

/// Background task that advances every running timer once per second.
///
/// The task claims the tick lease first; if another driver already holds it,
/// the task exits instead of double-charging the pool. When another process
/// turns out to be ticking the same store, this driver gives up its lease
/// and mirrors that process instead.
pub async fn tick_driver_task(state: Arc<AppState>) -> Result<(), EngineError> {
    tick_driver_with_period(state, Duration::from_secs(1)).await
}

/// Same as [`tick_driver_task`] with a configurable real-time period per tick
pub async fn tick_driver_with_period(state: Arc<AppState>, period: Duration) -> Result<(), EngineError> {
    let lease = match state.claim_tick_driver() {
        Ok(lease) => lease,
        Err(e) => {
            error!("Not starting tick driver: {}", e);
            return Err(e);
        }
    };
    info!("Starting tick driver task");

    let mut interval = interval(period);
    // Catch up after a stall so every real second is applied exactly once.
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
    // The first tick completes immediately; skip it so a second really passes.
    interval.tick().await;

    loop {
        interval.tick().await;

        match state.tick(&lease) {
            Ok(Some(committed)) => {
                debug!("Tick committed at revision {}", committed.snapshot.revision);
            }
            Ok(None) => {}
            Err(EngineError::TickDriverBusy) => {
                warn!("Another writer is driving the clock, stepping down to mirror it");
                drop(lease);
                follower_task(state, period).await;
                return Ok(());
            }
            Err(e) => error!("Tick failed: {}", e),
        }
    }
}
