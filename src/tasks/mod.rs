//! Background tasks module
//!
//! This module contains background tasks that run alongside the HTTP server.

pub mod day_rollover;
pub mod follower;
pub mod tick_driver;

// Re-export main functions
pub use day_rollover::day_rollover_task;
pub use follower::follower_task;
pub use tick_driver::tick_driver_task;
