//! JSON file snapshot store

use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, warn};

use super::{StorageError, SyncAdapter};
use crate::state::Snapshot;

/// How long a save waits for another process to release the lock file
const LOCK_WAIT: Duration = Duration::from_secs(2);
const LOCK_RETRY: Duration = Duration::from_millis(5);
/// A lock file older than this was left behind by a crashed writer
const LOCK_STALE: Duration = Duration::from_secs(10);

/// Stores the snapshot as pretty JSON at a fixed path.
///
/// Saves go through a sibling temp file and a rename so a concurrent reader
/// sees either the old or the new snapshot, never a torn one. The revision
/// check and the rename happen while holding a sibling `.lock` file, which
/// makes the compare-and-set hold across processes sharing the path.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, source: std::io::Error) -> StorageError {
        StorageError::Unavailable {
            path: self.path.clone(),
            source,
        }
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling(".tmp")
    }

    fn lock_path(&self) -> PathBuf {
        self.sibling(".lock")
    }

    fn acquire_lock(&self) -> Result<SaveLock, StorageError> {
        let path = self.lock_path();
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(SaveLock { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if lock_is_stale(&path) {
                        warn!("Removing stale lock file {}", path.display());
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    if started.elapsed() >= LOCK_WAIT {
                        return Err(self.unavailable(std::io::Error::new(
                            ErrorKind::WouldBlock,
                            "state file is locked by another writer",
                        )));
                    }
                    thread::sleep(LOCK_RETRY);
                }
                Err(e) => return Err(self.unavailable(e)),
            }
        }
    }

    /// Revision currently on disk. `None` when the file holds no readable
    /// snapshot and may be overwritten.
    fn stored_revision(&self) -> Result<Option<u64>, StorageError> {
        match self.load() {
            Ok(snapshot) => Ok(Some(snapshot.revision)),
            Err(StorageError::Empty) => Ok(Some(0)),
            Err(StorageError::Corrupt(e)) => {
                warn!("Overwriting unreadable snapshot at {}: {}", self.path.display(), e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn lock_is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > LOCK_STALE)
}

/// Held for the duration of one save, removed on drop
struct SaveLock {
    path: PathBuf,
}

impl Drop for SaveLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove lock file {}: {}", self.path.display(), e);
        }
    }
}

impl SyncAdapter for JsonFileStore {
    fn load(&self) -> Result<Snapshot, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(StorageError::Empty),
            Err(e) => return Err(self.unavailable(e)),
        };
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        debug!("Loaded snapshot revision {} from {}", snapshot.revision, self.path.display());
        Ok(snapshot)
    }

    fn save(&self, snapshot: &Snapshot, expected: u64) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.unavailable(e))?;
        }

        let _lock = self.acquire_lock()?;
        if let Some(found) = self.stored_revision()? {
            if found != expected {
                return Err(StorageError::Conflict { expected, found });
            }
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.temp_path();
        let mut file = File::create(&tmp).map_err(|e| self.unavailable(e))?;
        file.write_all(json.as_bytes()).map_err(|e| self.unavailable(e))?;
        file.sync_all().map_err(|e| self.unavailable(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.unavailable(e))?;
        debug!("Saved revision {} to {}", snapshot.revision, self.path.display());
        Ok(())
    }
}
