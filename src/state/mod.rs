//! State management module
//!
//! Runtime records, the persisted snapshot shape, the activity feed, and the
//! application state that owns the engine.

pub mod activity_log;
pub mod app_state;
pub mod pool_state;
pub mod snapshot;
pub mod timer_state;

// Re-export main types
pub use activity_log::{ActivityEntry, ActivityLog};
pub use app_state::{AppState, Committed, ServerInfo, TickLease};
pub use pool_state::PoolState;
pub use snapshot::Snapshot;
pub use timer_state::TimerState;
