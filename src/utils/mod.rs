//! Utility functions module
//!
//! Signal handling, day boundaries and duration formatting used across
//! the service.

pub mod calendar;
pub mod signals;
pub mod time_format;

// Re-export main functions
pub use calendar::{operational_day, operational_day_now};
pub use signals::shutdown_signal;
pub use time_format::{format_clock, format_signed};
