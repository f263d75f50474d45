//! Bundle Sync Library
//!
//! Content-addressed bundle synchronization client: scans a local file tree,
//! hashes its content, and converges a remote bundle until the server holds
//! every file.

pub mod api;
pub mod config;
pub mod fs;
pub mod observer;
pub mod sync;
pub mod utils;

// Re-export commonly used types
pub use api::{BundleApi, RemoteBundle};
pub use config::Config;
pub use fs::scanner::FileDescriptor;
pub use observer::{NullObserver, SyncObserver};
pub use utils::errors::SyncError;
pub type Result<T> = std::result::Result<T, SyncError>;
