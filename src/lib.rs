//! Discipline Timer - break timers backed by a shared daily break pool
//!
//! Each timer counts up against its own limit. Time spent past the limit is
//! charged to a global pool that may go negative. This library provides the
//! accounting engine, snapshot persistence, and the HTTP service around it.

pub mod config;
pub mod engine;
pub mod state;
pub mod sync;
pub mod api;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use engine::{Access, AccountingEngine, EngineError};
pub use state::AppState;
pub use api::create_router;
pub use utils::signals::shutdown_signal;
