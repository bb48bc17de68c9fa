//! Storage contract consumed by the application state

use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::broadcast;

use crate::state::Snapshot;

/// Failures of the backing store. Apart from `Conflict`, all of them are
/// transient from the engine's point of view: in-memory state stays committed.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stored snapshot is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Nothing has been stored yet")]
    Empty,

    /// Another writer saved since this one last read the store
    #[error("Store is at revision {found}, expected {expected}")]
    Conflict { expected: u64, found: u64 },
}

/// Loads and saves engine snapshots.
pub trait SyncAdapter: Send + Sync {
    /// Read the last stored snapshot
    fn load(&self) -> Result<Snapshot, StorageError>;

    /// Replace the stored snapshot, but only while the store still holds
    /// revision `expected` (0 for an empty store). Fails with
    /// `StorageError::Conflict` otherwise and leaves the store untouched.
    fn save(&self, snapshot: &Snapshot, expected: u64) -> Result<(), StorageError>;

    /// Push notifications for snapshots saved by other writers, if the
    /// store can deliver them. Callers fall back to polling `load`.
    fn subscribe(&self) -> Option<broadcast::Receiver<Snapshot>> {
        None
    }
}
