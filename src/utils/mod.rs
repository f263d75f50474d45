//! Utility modules for the bundle synchronization client.

pub mod errors;
pub mod logger;

pub use errors::{Result, SyncError};
