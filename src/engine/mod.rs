//! Accounting engine module
//!
//! Timer configuration, the accounting rules, and presentation views.

pub mod accounting;
pub mod error;
pub mod spec;
pub mod view;

pub use accounting::AccountingEngine;
pub use error::{EngineError, SpecError};
pub use spec::{RestartQuota, TimerSpec, TimerTable};
pub use view::{DayView, PoolView, TimerView};

/// Capability of the caller issuing an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Admin,
    ReadOnly,
}

impl Access {
    pub fn from_privileged(privileged: bool) -> Self {
        if privileged { Access::Admin } else { Access::ReadOnly }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Access::Admin)
    }

    /// Fail with `PermissionDenied` unless this is admin access
    pub fn require(&self, operation: &'static str) -> Result<(), EngineError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(EngineError::PermissionDenied(operation))
        }
    }
}
