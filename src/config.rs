//! Configuration management for the bundle synchronization client.
//!
//! Loads configuration from a TOML file; every field has a serde default so
//! a partial file (or none at all) still yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default payload byte budget shared by bundle chunking and uploads (4 MiB).
pub const MAX_PAYLOAD: u64 = 4 * 1024 * 1024;

/// Fixed per-file overhead added to content size when filling an upload payload.
pub const UPLOAD_FILE_OVERHEAD: u64 = 200;

/// Approximate wire cost of one (bundlePath, hash) key pair in a create/extend
/// call; the bundle chunk size is `max_payload / BUNDLE_KEY_OVERHEAD` files.
pub const BUNDLE_KEY_OVERHEAD: u64 = 300;

/// Maximum resolution rounds before giving up on missing files.
pub const MAX_UPLOAD_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bundle service base URL
    pub url: String,

    /// Session token sent with every request
    pub token: String,
}

/// What to do with a file whose overhead-adjusted size exceeds the payload
/// budget. Such a file can never be uploaded, so it is either skipped (and
/// reported) or treated as a hard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OversizedFilePolicy {
    Skip,
    Error,
}

impl Default for OversizedFilePolicy {
    fn default() -> Self {
        OversizedFilePolicy::Skip
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Payload byte budget for both bundle chunks and upload chunks
    #[serde(default = "default_max_payload")]
    pub max_payload_bytes: u64,

    /// Maximum missing-file resolution rounds
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Maximum upload chunks in flight at once
    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,

    /// Follow symbolic links while scanning
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Policy for files too large to ever fit a payload
    #[serde(default)]
    pub oversized_file_policy: OversizedFilePolicy,

    /// File extensions eligible for bundling (empty = all files)
    #[serde(default)]
    pub supported_extensions: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload(),
            max_attempts: default_max_attempts(),
            upload_concurrency: default_upload_concurrency(),
            follow_symlinks: false,
            oversized_file_policy: OversizedFilePolicy::default(),
            supported_extensions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default values
fn default_max_payload() -> u64 {
    MAX_PAYLOAD
}

fn default_max_attempts() -> usize {
    MAX_UPLOAD_ATTEMPTS
}

fn default_upload_concurrency() -> usize {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
