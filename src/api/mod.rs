//! Bundle service API contract.
//!
//! The synchronization engine only ever talks to the service through the
//! [`BundleApi`] trait, so tests drive it with an in-memory fake and the
//! binary wires in the HTTP client from [`http`].

pub mod http;

use crate::utils::errors::{Result, SyncError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Map of bundle-relative path to content hash, ordered for a stable wire
/// representation.
pub type FileHashes = BTreeMap<String, String>;

/// Server-issued bundle handle.
///
/// Treated as a value: every create/extend/check call returns a fresh one
/// and the previous value is logically superseded, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteBundle {
    pub bundle_id: String,

    /// Bundle-relative paths the server has registered but holds no content for
    #[serde(default)]
    pub missing_files: Vec<String>,

    /// Optional dedicated upload endpoint
    #[serde(default, rename = "uploadURL")]
    pub upload_url: Option<String>,
}

impl RemoteBundle {
    /// A bundle converges when the server holds content for every file.
    pub fn is_converged(&self) -> bool {
        self.missing_files.is_empty()
    }
}

/// One file's content as sent to the upload endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub file_hash: String,
    pub file_content: String,
}

/// Request/response contract with the bundle service.
///
/// All failures surface as [`SyncError::Remote`] carrying the status code
/// and text; a 404-class error from `check_bundle` means the bundle id is
/// unknown or expired and is never retried.
#[async_trait]
pub trait BundleApi: Send + Sync {
    /// Register a new bundle from a path→hash manifest.
    async fn create_bundle(&self, files: &FileHashes) -> Result<RemoteBundle>;

    /// Add/replace files in an existing bundle and drop `removed_files`.
    async fn extend_bundle(
        &self,
        bundle_id: &str,
        files: &FileHashes,
        removed_files: &[String],
    ) -> Result<RemoteBundle>;

    /// Fetch the current state of a bundle.
    async fn check_bundle(&self, bundle_id: &str) -> Result<RemoteBundle>;

    /// Upload content for files the server reported missing.
    async fn upload_files(&self, bundle_id: &str, content: &[UploadedFile]) -> Result<()>;
}

/// Build the error for a failed API response.
pub fn remote_error(status_code: u16, status_text: impl Into<String>) -> SyncError {
    SyncError::Remote {
        status_code,
        status_text: status_text.into(),
    }
}
