//! Bundle synchronization engine: payload composition, the create/extend
//! chain with its convergence loop, and the concurrent upload scheduler.

pub mod bundle;
pub mod payload;
pub mod upload;

pub use bundle::BundleSynchronizer;
pub use payload::{compose_payloads, prepare_extension, ExtensionDiff};
pub use upload::UploadScheduler;

use crate::api::{BundleApi, RemoteBundle};
use crate::config::SyncConfig;
use crate::fs::ignore::collect_ignore_rules;
use crate::fs::scanner::{scan_bundle_files, FileDescriptor, ScanOptions};
use crate::observer::ObserverHandle;
use crate::utils::errors::{Result, SyncError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Scan a tree and drive it to a converged bundle in one call.
///
/// Collects ignore rules under `root`, scans `paths` (scan root itself when
/// empty), then creates or extends the bundle and resolves missing files.
/// The scan runs off the async runtime; the observer sees the full event
/// sequence from `supported_file_types_loaded` through the last
/// `upload_progress`.
pub async fn synchronize_folder(
    api: Arc<dyn BundleApi>,
    observer: ObserverHandle,
    config: &SyncConfig,
    root: &Path,
    paths: &[PathBuf],
    existing_bundle_id: Option<String>,
    cancel: CancellationToken,
) -> Result<RemoteBundle> {
    let options = ScanOptions {
        supported_extensions: config.supported_extensions.clone(),
        follow_symlinks: config.follow_symlinks,
        max_file_size: config.max_payload_bytes,
        oversized_file_policy: config.oversized_file_policy,
    };

    let scan_root = root.to_path_buf();
    let scan_paths = if paths.is_empty() {
        vec![scan_root.clone()]
    } else {
        paths.to_vec()
    };
    let scan_observer = Arc::clone(&observer);

    let files: Vec<FileDescriptor> = tokio::task::spawn_blocking(move || {
        let rules = collect_ignore_rules(&[scan_root.clone()])?;
        scan_bundle_files(&scan_root, &scan_paths, &rules, options, scan_observer)
            .collect::<Result<Vec<_>>>()
    })
    .await
    .map_err(|e| SyncError::Io(std::io::Error::other(e)))??;

    info!("Scanned {} eligible files under {}", files.len(), root.display());

    let synchronizer = BundleSynchronizer::with_cancel(api, observer, config.clone(), cancel);
    synchronizer
        .synchronize(root, files, Vec::new(), existing_bundle_id)
        .await
}
