//! Main application state management

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Instant,
};
use chrono::NaiveDate;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{ActivityEntry, ActivityLog, Snapshot};
use crate::{
    engine::{Access, AccountingEngine, DayView, EngineError, PoolView, TimerView},
    sync::{StorageError, SyncAdapter},
    utils::{format_signed, operational_day_now},
};

/// Saves attempted per operation before giving up on a contended store
const MAX_SAVE_ATTEMPTS: u32 = 3;

/// Engine plus the bookkeeping persisted next to it
#[derive(Debug, Clone)]
struct Ledger {
    engine: AccountingEngine,
    revision: u64,
    day: Option<NaiveDate>,
    /// Revision the store held when this process last read or wrote it
    stored: u64,
}

/// What `commit` does after losing a save race to another writer.
/// Either way the ledger first adopts the store's snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnConflict {
    /// Re-run the operation on top of the adopted state
    Retry,
    /// Drop the operation and report `WriteConflict`
    Yield,
}

impl Ledger {
    fn adopt(&mut self, snapshot: &Snapshot) {
        self.engine.restore(snapshot);
        self.revision = snapshot.revision;
        self.day = snapshot.day;
        self.stored = snapshot.revision;
    }

    fn snapshot(&self) -> Snapshot {
        self.engine.snapshot(self.revision, self.day)
    }

    fn view(&self) -> DayView {
        self.engine.day_view(self.revision, self.day)
    }
}

/// Human-readable summary of an operation's result for the activity feed
trait Detail {
    fn detail(&self) -> Option<String>;
}

impl Detail for () {
    fn detail(&self) -> Option<String> {
        None
    }
}

/// Seconds charged to the pool
impl Detail for u64 {
    fn detail(&self) -> Option<String> {
        Some(format!("charged {}", format_signed(i64::try_from(*self).unwrap_or(i64::MAX))))
    }
}

/// Restarts used so far
impl Detail for u32 {
    fn detail(&self) -> Option<String> {
        Some(format!("restart #{}", self))
    }
}

impl Detail for NaiveDate {
    fn detail(&self) -> Option<String> {
        Some(format!("day {}", self))
    }
}

/// Result of a committed operation
#[derive(Debug, Clone)]
pub struct Committed<T> {
    pub value: T,
    pub snapshot: Snapshot,
    /// Presentation of the state right after this operation
    pub view: DayView,
    /// Set when the local commit could not be persisted
    pub warning: Option<String>,
}

/// Server metadata reported by the status endpoints
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub port: u16,
    pub host: String,
    /// Local hour at which a new operational day begins
    pub reset_hour: u32,
    /// Mirror another writer instead of accepting mutations
    pub follower: bool,
    /// Header token granting admin access; `None` falls back to `?admin=true`
    pub admin_token: Option<String>,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            port: 0,
            host: "127.0.0.1".to_string(),
            reset_hour: 0,
            follower: false,
            admin_token: None,
        }
    }
}

/// Owns the single engine instance of the process.
///
/// Every operation runs under one lock, is saved with a compare-and-set on
/// the stored revision and is published before the lock is released. Readers
/// never observe a half-applied operation, and a writer that lost a race
/// with another process adopts the stored state instead of overwriting it.
/// An unreachable store only downgrades the commit to local.
pub struct AppState {
    ledger: Mutex<Ledger>,
    store: Arc<dyn SyncAdapter>,
    activity: Mutex<ActivityLog>,
    tick_claimed: AtomicBool,
    /// Latest committed snapshot for watchers
    snapshot_tx: watch::Sender<Snapshot>,
    pub info: ServerInfo,
    pub start_time: Instant,
}

impl AppState {
    /// Create an AppState around a fresh engine
    pub fn new(engine: AccountingEngine, store: Arc<dyn SyncAdapter>, info: ServerInfo) -> Self {
        let ledger = Ledger { engine, revision: 0, day: None, stored: 0 };
        let (snapshot_tx, _) = watch::channel(ledger.snapshot());

        Self {
            ledger: Mutex::new(ledger),
            store,
            activity: Mutex::new(ActivityLog::default()),
            tick_claimed: AtomicBool::new(false),
            snapshot_tx,
            info,
            start_time: Instant::now(),
        }
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|poisoned| {
            warn!("Engine lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn activity_log(&self) -> MutexGuard<'_, ActivityLog> {
        self.activity.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn store(&self) -> &Arc<dyn SyncAdapter> {
        &self.store
    }

    /// Watch committed snapshots, starting from the current one
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Hand `snapshot` to watchers unless they already hold a later revision
    fn publish(&self, snapshot: Snapshot) {
        self.snapshot_tx.send_if_modified(|current| {
            if snapshot.revision > current.revision {
                *current = snapshot;
                true
            } else {
                false
            }
        });
    }

    /// Restore the stored snapshot, keeping the fresh defaults if the store
    /// is empty or unreachable
    pub fn load_from_store(&self) -> Result<u64, StorageError> {
        let snapshot = match self.store.load() {
            Ok(snapshot) => snapshot,
            Err(StorageError::Empty) => {
                info!("No stored state, starting a fresh day");
                return Ok(0);
            }
            Err(e) => {
                warn!("Failed to load stored state, using defaults: {}", e);
                return Err(e);
            }
        };

        let mut ledger = self.ledger();
        ledger.adopt(&snapshot);
        self.publish(ledger.snapshot());
        drop(ledger);

        info!("Restored state at revision {}", snapshot.revision);
        Ok(snapshot.revision)
    }

    /// Replace the ledger with whatever the store holds now. Leaves it
    /// untouched when the store cannot be read.
    fn adopt_stored(&self, ledger: &mut Ledger) {
        match self.store.load() {
            Ok(snapshot) => {
                ledger.adopt(&snapshot);
                self.publish(ledger.snapshot());
            }
            Err(StorageError::Empty) => ledger.stored = 0,
            Err(e) => warn!("Failed to reload contended store: {}", e),
        }
    }

    /// Apply an operation, persist the result and notify watchers.
    ///
    /// The operation runs on a draft of the ledger. The draft replaces the
    /// ledger once the store accepted it, or when the store is unreachable.
    /// A save conflict adopts the stored state and then follows `on_conflict`.
    fn commit<T, F>(
        &self,
        action: &str,
        timer: Option<&str>,
        on_conflict: OnConflict,
        op: F,
    ) -> Result<Committed<T>, EngineError>
    where
        F: Fn(&mut Ledger) -> Result<T, EngineError>,
        T: Detail,
    {
        let mut ledger = self.ledger();
        let mut attempt = 1;
        let (value, warning) = loop {
            let mut draft = ledger.clone();
            let value = op(&mut draft)?;
            draft.revision += 1;
            let snapshot = draft.snapshot();

            match self.store.save(&snapshot, ledger.stored) {
                Ok(()) => {
                    draft.stored = snapshot.revision;
                    *ledger = draft;
                    break (value, None);
                }
                Err(StorageError::Conflict { found, .. }) => {
                    warn!(
                        "{} at revision {} lost to another writer (store at {})",
                        action, snapshot.revision, found
                    );
                    self.adopt_stored(&mut *ledger);
                    if on_conflict == OnConflict::Yield || attempt >= MAX_SAVE_ATTEMPTS {
                        return Err(EngineError::WriteConflict { revision: ledger.revision });
                    }
                    attempt += 1;
                }
                Err(e) => {
                    warn!("Failed to persist {} at revision {}: {}", action, snapshot.revision, e);
                    *ledger = draft;
                    break (value, Some(format!("Saved locally only, will retry on next change: {}", e)));
                }
            }
        };

        let snapshot = ledger.snapshot();
        let view = ledger.view();
        self.publish(snapshot.clone());
        drop(ledger);

        if action != "tick" {
            let detail = value.detail();
            info!("Committed {} on {} ({})", action, timer.unwrap_or("all"), detail.as_deref().unwrap_or("-"));
            self.activity_log().record(action, timer, detail);
        }

        Ok(Committed { value, snapshot, view, warning })
    }

    pub fn start(&self, access: Access, id: &str) -> Result<Committed<()>, EngineError> {
        self.commit("start", Some(id), OnConflict::Retry, |l| l.engine.start(access, id))
    }

    pub fn stop(&self, access: Access, id: &str) -> Result<Committed<()>, EngineError> {
        self.commit("stop", Some(id), OnConflict::Retry, |l| l.engine.stop(access, id))
    }

    pub fn restart(&self, access: Access, id: &str) -> Result<Committed<u32>, EngineError> {
        self.commit("restart", Some(id), OnConflict::Retry, |l| {
            l.engine.restart(access, id).map(|state| state.restarts_used)
        })
    }

    /// Returns the seconds charged to the pool
    pub fn manual_adjust(&self, access: Access, id: &str, delta_seconds: i64) -> Result<Committed<u64>, EngineError> {
        self.commit("adjust", Some(id), OnConflict::Retry, |l| l.engine.manual_adjust(access, id, delta_seconds))
    }

    /// Returns the seconds charged to the pool
    pub fn jump_time(&self, access: Access, id: &str, minutes: i64) -> Result<Committed<u64>, EngineError> {
        self.commit("jump", Some(id), OnConflict::Retry, |l| l.engine.jump_time(access, id, minutes))
    }

    /// Start a new day and stamp it with the current operational day
    pub fn reset_day(&self, access: Access) -> Result<Committed<NaiveDate>, EngineError> {
        let today = operational_day_now(self.info.reset_hour);
        self.commit("reset", None, OnConflict::Retry, |l| {
            l.engine.reset_day(access)?;
            l.day = Some(today);
            Ok(today)
        })
    }

    /// Reset when `today` differs from the stored day.
    ///
    /// State that has never been stamped is adopted as today's instead of
    /// being wiped. Returns whether anything changed.
    pub fn roll_over(&self, today: NaiveDate) -> Result<bool, EngineError> {
        let current = self.ledger().day;
        match current {
            Some(day) if day == today => Ok(false),
            Some(day) => {
                info!("Operational day changed from {} to {}, resetting", day, today);
                self.commit("rollover", None, OnConflict::Yield, |l| {
                    l.engine.reset_day(Access::Admin)?;
                    l.day = Some(today);
                    Ok(today)
                })?;
                Ok(true)
            }
            None => {
                self.commit("adopt-day", None, OnConflict::Yield, |l| {
                    l.day = Some(today);
                    Ok(today)
                })?;
                Ok(true)
            }
        }
    }

    /// Claim the right to drive ticks. Only one lease exists at a time.
    pub fn claim_tick_driver(self: &Arc<Self>) -> Result<TickLease, EngineError> {
        self.tick_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| EngineError::TickDriverBusy)?;
        debug!("Tick driver lease granted");
        Ok(TickLease { state: Arc::clone(self) })
    }

    /// Advance the clock by one second. Idle days are not persisted.
    ///
    /// Fails with `TickDriverBusy` when another process committed to the
    /// store since our last save: that process is driving the clock too, and
    /// this tick is dropped rather than counted twice.
    pub fn tick(&self, _lease: &TickLease) -> Result<Option<Committed<()>>, EngineError> {
        if !self.ledger().engine.any_running() {
            return Ok(None);
        }
        match self.commit("tick", None, OnConflict::Yield, |l| l.engine.tick(Access::Admin)) {
            Ok(committed) => Ok(Some(committed)),
            Err(EngineError::WriteConflict { .. }) => Err(EngineError::TickDriverBusy),
            Err(e) => Err(e),
        }
    }

    /// Adopt a snapshot written by another process if it is newer
    pub fn apply_external(&self, snapshot: &Snapshot) -> bool {
        let mut ledger = self.ledger();
        if !snapshot.is_newer_than(ledger.revision) {
            return false;
        }
        ledger.adopt(snapshot);
        self.publish(ledger.snapshot());
        drop(ledger);

        debug!("Mirrored external revision {}", snapshot.revision);
        true
    }

    pub fn snapshot(&self) -> Snapshot {
        self.ledger().snapshot()
    }

    pub fn revision(&self) -> u64 {
        self.ledger().revision
    }

    /// Pool and timers read under one lock
    pub fn day_view(&self) -> DayView {
        self.ledger().view()
    }

    pub fn timer_view(&self, id: &str) -> Result<TimerView, EngineError> {
        self.ledger()
            .engine
            .timer_view(id)
            .ok_or_else(|| EngineError::InvalidTimer(id.to_string()))
    }

    pub fn pool_view(&self) -> PoolView {
        self.ledger().engine.pool_view()
    }

    pub fn activity(&self) -> Vec<ActivityEntry> {
        self.activity_log().entries()
    }

    pub fn is_follower(&self) -> bool {
        self.info.follower
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

/// Exclusive right to drive the clock, released on drop
pub struct TickLease {
    state: Arc<AppState>,
}

impl Drop for TickLease {
    fn drop(&mut self) {
        self.state.tick_claimed.store(false, Ordering::Release);
        debug!("Tick driver lease released");
    }
}
