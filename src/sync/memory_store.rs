//! In-process snapshot store with change notifications

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use tokio::sync::broadcast;
use tracing::warn;

use super::{StorageError, SyncAdapter};
use crate::state::Snapshot;

#[derive(Debug)]
pub struct MemoryStore {
    snapshot: Mutex<Option<Snapshot>>,
    change_tx: broadcast::Sender<Snapshot>,
    /// When set, every call fails as if the store were unreachable
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(64);
        Self {
            snapshot: Mutex::new(None),
            change_tx,
            offline: AtomicBool::new(false),
        }
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        *store.lock() = Some(snapshot);
        store
    }

    /// Simulate the store going away or coming back
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Snapshot>> {
        self.snapshot.lock().unwrap_or_else(|poisoned| {
            warn!("Memory store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn check_online(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                path: "memory".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotConnected, "store offline"),
            });
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncAdapter for MemoryStore {
    fn load(&self) -> Result<Snapshot, StorageError> {
        self.check_online()?;
        self.lock().clone().ok_or(StorageError::Empty)
    }

    fn save(&self, snapshot: &Snapshot, expected: u64) -> Result<(), StorageError> {
        self.check_online()?;
        let mut stored = self.lock();
        let found = stored.as_ref().map_or(0, |s| s.revision);
        if found != expected {
            return Err(StorageError::Conflict { expected, found });
        }
        *stored = Some(snapshot.clone());
        drop(stored);
        // No subscribers is fine.
        let _ = self.change_tx.send(snapshot.clone());
        Ok(())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<Snapshot>> {
        Some(self.change_tx.subscribe())
    }
}
