//! Read-only mirroring of another writer's snapshots

use std::{sync::Arc, time::Duration};
use tokio::{sync::broadcast::error::RecvError, time::interval};
use tracing::{debug, info, warn};

use crate::{state::AppState, sync::StorageError};

/// Background task that keeps a follower in step with the store.
///
/// Uses the store's change notifications when it has them and polls
/// `load()` at `poll_every` otherwise.
pub async fn follower_task(state: Arc<AppState>, poll_every: Duration) {
    match state.store().subscribe() {
        Some(mut changes) => {
            info!("Following store change notifications");
            loop {
                match changes.recv().await {
                    Ok(snapshot) => {
                        state.apply_external(&snapshot);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Follower lagged by {} snapshots, reloading", skipped);
                        reload(&state);
                    }
                    Err(RecvError::Closed) => {
                        warn!("Store notifications closed, stopping follower");
                        return;
                    }
                }
            }
        }
        None => {
            info!("Polling store every {:?}", poll_every);
            let mut interval = interval(poll_every);
            loop {
                interval.tick().await;
                reload(&state);
            }
        }
    }
}

fn reload(state: &AppState) {
    match state.store().load() {
        Ok(snapshot) => {
            state.apply_external(&snapshot);
        }
        Err(StorageError::Empty) => {}
        Err(e) => warn!("Follower failed to load snapshot: {}", e),
    }
}
