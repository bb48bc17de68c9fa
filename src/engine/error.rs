//! Engine error types

use thiserror::Error;

/// Errors returned by accounting operations.
///
/// Every variant aborts the requested operation with no state change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Unknown timer: {0}")]
    InvalidTimer(String),

    #[error("Timer '{id}' has used all {max} restarts for today")]
    RestartQuotaExceeded { id: String, max: u32 },

    #[error("Timer '{id}' is not in overflow ({elapsed}s of {limit}s elapsed)")]
    NotInOverflow { id: String, elapsed: u64, limit: u64 },

    #[error("Operation '{0}' requires admin access")]
    PermissionDenied(&'static str),

    #[error("Another tick driver already holds the clock")]
    TickDriverBusy,

    #[error("Another writer moved the store to revision {revision}, retry the operation")]
    WriteConflict { revision: u64 },
}

/// Errors raised while building the timer table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("Timer table is empty")]
    Empty,

    #[error("Duplicate timer id: {0}")]
    DuplicateId(String),

    #[error("Timer '{0}' must have a limit above zero")]
    ZeroLimit(String),

    #[error("Timer id must not be blank")]
    BlankId,
}
