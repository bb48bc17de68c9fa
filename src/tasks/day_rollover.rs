//! Automatic day reset at the configured local hour

use std::{sync::Arc, time::Duration};
use tokio::time::interval;
use tracing::{info, warn};

use crate::{state::AppState, utils::operational_day_now};

/// Background task that starts a fresh day once the operational day changes
pub async fn day_rollover_task(state: Arc<AppState>) {
    info!("Starting day rollover task (reset hour {:02}:00)", state.info.reset_hour);

    let mut interval = interval(Duration::from_secs(30));

    loop {
        interval.tick().await;

        let today = operational_day_now(state.info.reset_hour);
        match state.roll_over(today) {
            Ok(true) => info!("Day is now {}", today),
            Ok(false) => {}
            Err(e) => warn!("Failed to roll over day: {}", e),
        }
    }
}
