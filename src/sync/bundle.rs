//! Bundle creation, extension and the missing-file convergence loop.
//!
//! A synchronization passes through building (sequential create/extend
//! chunks), resolving (bounded upload-and-recheck rounds) and ends converged
//! or failed. The create/extend chain is a fold over chunks carrying the
//! evolving bundle handle: each extend's diff semantics depend on the server
//! state the previous call just produced, so chunks are never parallelized.

use crate::api::{BundleApi, FileHashes, RemoteBundle};
use crate::config::{SyncConfig, BUNDLE_KEY_OVERHEAD};
use crate::fs::scanner::{resolve_bundle_files, FileDescriptor};
use crate::observer::ObserverHandle;
use crate::sync::upload::UploadScheduler;
use crate::utils::errors::{Result, SyncError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Drives a local manifest to convergence against the remote bundle service.
pub struct BundleSynchronizer {
    api: Arc<dyn BundleApi>,
    observer: ObserverHandle,
    config: SyncConfig,
    cancel: CancellationToken,
}

impl BundleSynchronizer {
    /// Create a synchronizer (no cancellation support)
    pub fn new(api: Arc<dyn BundleApi>, observer: ObserverHandle, config: SyncConfig) -> Self {
        Self::with_cancel(api, observer, config, CancellationToken::new())
    }

    /// Create a synchronizer with cancellation support
    pub fn with_cancel(
        api: Arc<dyn BundleApi>,
        observer: ObserverHandle,
        config: SyncConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            observer,
            config,
            cancel,
        }
    }

    /// Synchronize a manifest, returning the converged bundle handle.
    ///
    /// `files` is the full manifest (or the new/changed half of an extension
    /// diff); `removed_files` is forwarded to the server on the first call
    /// only. With `existing_bundle_id` the chain starts with an extend,
    /// otherwise with a create.
    pub async fn synchronize(
        &self,
        root: &Path,
        files: Vec<FileDescriptor>,
        removed_files: Vec<String>,
        existing_bundle_id: Option<String>,
    ) -> Result<RemoteBundle> {
        let bundle = self
            .build_bundle(&files, &removed_files, existing_bundle_id)
            .await?;
        let bundle = self.resolve_missing(root, bundle).await?;

        info!(
            "Bundle {} converged ({} manifest files)",
            bundle.bundle_id,
            files.len()
        );
        Ok(bundle)
    }

    /// Building phase: submit the manifest in strictly sequential chunks.
    ///
    /// The chunk size is coarser than the upload budget: one (path, hash)
    /// key costs roughly [`BUNDLE_KEY_OVERHEAD`] bytes on the wire, so each
    /// chunk carries `max_payload / BUNDLE_KEY_OVERHEAD` files.
    async fn build_bundle(
        &self,
        files: &[FileDescriptor],
        removed_files: &[String],
        existing_bundle_id: Option<String>,
    ) -> Result<RemoteBundle> {
        let chunk_capacity =
            (self.config.max_payload_bytes / BUNDLE_KEY_OVERHEAD).max(1) as usize;
        let chunks: Vec<&[FileDescriptor]> = files.chunks(chunk_capacity).collect();
        let total = chunks.len();

        debug!(
            "Building bundle: {} files in {} chunks (existing id: {:?})",
            files.len(),
            total,
            existing_bundle_id
        );
        self.observer.bundle_build_progress(0, total);

        // Empty manifest: still register the bundle when there is no id yet;
        // with an id, apply pending removals or just materialize the handle.
        if chunks.is_empty() {
            return match existing_bundle_id {
                None => self.api.create_bundle(&FileHashes::new()).await,
                Some(id) if !removed_files.is_empty() => {
                    self.api
                        .extend_bundle(&id, &FileHashes::new(), removed_files)
                        .await
                }
                Some(id) => self.api.check_bundle(&id).await,
            };
        }

        let empty_removed: &[String] = &[];
        let mut bundle_id = existing_bundle_id;
        let mut bundle: Option<RemoteBundle> = None;

        for (i, chunk) in chunks.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let file_hashes: FileHashes = chunk
                .iter()
                .map(|f| (f.bundle_path.clone(), f.hash.clone()))
                .collect();
            // Removals ride along on the first call only.
            let removed = if i == 0 { removed_files } else { empty_removed };

            let response = match &bundle_id {
                None => self.api.create_bundle(&file_hashes).await?,
                Some(id) => self.api.extend_bundle(id, &file_hashes, removed).await?,
            };

            self.observer.bundle_build_progress(i + 1, total);
            bundle_id = Some(response.bundle_id.clone());
            bundle = Some(response);
        }

        match bundle {
            Some(bundle) => Ok(bundle),
            // Unreachable: the empty-manifest path returned above.
            None => Err(SyncError::Config("bundle build produced no handle".into())),
        }
    }

    /// Resolving phase: upload missing content and re-check until the bundle
    /// converges or attempts run out.
    ///
    /// Performs at most `max_attempts` rounds, each of which fully completes
    /// (upload plus re-check) before the next starts. A round whose upload
    /// does not fully succeed fails the operation immediately.
    async fn resolve_missing(&self, root: &Path, mut bundle: RemoteBundle) -> Result<RemoteBundle> {
        if bundle.is_converged() {
            return Ok(bundle);
        }

        let scheduler = UploadScheduler::new(
            Arc::clone(&self.api),
            Arc::clone(&self.observer),
            self.config.upload_concurrency,
            self.cancel.clone(),
        );

        let mut attempts = 0;
        while !bundle.is_converged() && attempts < self.config.max_attempts {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            debug!(
                "Resolution round {}: {} files missing from bundle {}",
                attempts + 1,
                bundle.missing_files.len(),
                bundle.bundle_id
            );

            let missing = self
                .materialize(root.to_path_buf(), bundle.missing_files.clone())
                .await?;

            let uploaded = scheduler
                .upload(&bundle.bundle_id, missing, self.config.max_payload_bytes)
                .await?;
            if !uploaded {
                return Err(SyncError::UploadRoundFailed);
            }

            bundle = self.api.check_bundle(&bundle.bundle_id).await?;
            attempts += 1;
        }

        if !bundle.is_converged() {
            return Err(SyncError::ConvergenceExhausted {
                remaining_missing: bundle.missing_files.len(),
            });
        }
        Ok(bundle)
    }

    /// Load missing files' content off the async runtime.
    async fn materialize(
        &self,
        root: PathBuf,
        missing: Vec<String>,
    ) -> Result<Vec<FileDescriptor>> {
        let observer = Arc::clone(&self.observer);
        tokio::task::spawn_blocking(move || resolve_bundle_files(&root, &missing, &observer))
            .await
            .map_err(|e| SyncError::Io(std::io::Error::other(e)))
    }
}
