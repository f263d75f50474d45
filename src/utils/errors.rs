//! Custom error types for the bundle synchronization client.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Remote error {status_code}: {status_text}")]
    Remote { status_code: u16, status_text: String },

    #[error("File exceeds payload budget: {path} ({size} bytes)")]
    OversizedFile { path: String, size: u64 },

    #[error("Failed to upload some files")]
    UploadRoundFailed,

    #[error("Bundle did not converge: {remaining_missing} files still missing")]
    ConvergenceExhausted { remaining_missing: usize },

    #[error("Operation cancelled")]
    Cancelled,
}

impl SyncError {
    /// True when the remote answered with a 404-class status, meaning the
    /// bundle id is unknown or has expired server-side.
    pub fn is_bundle_gone(&self) -> bool {
        matches!(self, SyncError::Remote { status_code: 404, .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
