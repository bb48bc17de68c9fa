//! Snapshot persistence module
//!
//! The engine only sees the [`SyncAdapter`] trait. A JSON file store backs
//! the service; the in-memory store backs tests and in-process followers.

pub mod adapter;
pub mod file_store;
pub mod memory_store;

pub use adapter::{StorageError, SyncAdapter};
pub use file_store::JsonFileStore;
pub use memory_store::MemoryStore;
