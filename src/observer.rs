//! Progress notification interface.
//!
//! Every long-running operation takes an observer scoped to that call, so
//! two concurrent synchronizations never interleave their notifications.
//! All methods are one-way and default to no-ops; implementors override
//! only what they care about.

use std::sync::Arc;

/// Observer for synchronization progress events.
///
/// Notifications carry running totals, never deltas, so a late or dropped
/// call only delays the display rather than corrupting it.
pub trait SyncObserver: Send + Sync {
    /// Number of files scanned so far, emitted after each file.
    fn scan_progress(&self, _files_processed: usize) {}

    /// Emitted once before a scan begins, with the extension filter in
    /// effect (`None` means all extensions are accepted).
    fn supported_file_types_loaded(&self, _extensions: Option<&[String]>) {}

    /// Emitted after each create/extend chunk as (completed, total).
    fn bundle_build_progress(&self, _completed: usize, _total: usize) {}

    /// Emitted after each upload chunk completes as (files uploaded, total
    /// files in this round).
    fn upload_progress(&self, _uploaded: usize, _total: usize) {}

    /// Free-form request/diagnostic log line.
    fn request_log(&self, _message: &str) {}
}

/// Observer that discards every notification.
pub struct NullObserver;

impl SyncObserver for NullObserver {}

/// Shared observer handle passed into operations.
pub type ObserverHandle = Arc<dyn SyncObserver>;
