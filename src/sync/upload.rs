//! Concurrent upload of one resolution round's missing files.
//!
//! Files are split into size-bounded chunks and every chunk becomes its own
//! upload call. Chunks within a round are independent (distinct
//! content-addressed files), so they run concurrently under a semaphore cap;
//! the shared progress counter is an atomic to survive concurrently
//! completing chunks.

use crate::api::{BundleApi, UploadedFile};
use crate::fs::scanner::FileDescriptor;
use crate::observer::ObserverHandle;
use crate::sync::payload::compose_payloads;
use crate::utils::errors::{Result, SyncError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Schedules one round of missing-file uploads.
pub struct UploadScheduler {
    api: Arc<dyn BundleApi>,
    observer: ObserverHandle,
    concurrency: usize,
    cancel: CancellationToken,
}

impl UploadScheduler {
    pub fn new(
        api: Arc<dyn BundleApi>,
        observer: ObserverHandle,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            observer,
            concurrency: concurrency.max(1),
            cancel,
        }
    }

    /// Upload `files` to the bundle in size-bounded concurrent chunks.
    ///
    /// Returns `Ok(true)` only when every chunk succeeded; a partially
    /// successful round is a failed round. An empty input is a successful
    /// no-op with zero calls.
    pub async fn upload(
        &self,
        bundle_id: &str,
        files: Vec<FileDescriptor>,
        max_payload_bytes: u64,
    ) -> Result<bool> {
        let total_files = files.len();
        self.observer.upload_progress(0, total_files);

        if files.is_empty() {
            return Ok(true);
        }

        let chunks: Vec<Vec<FileDescriptor>> =
            compose_payloads(files, max_payload_bytes).collect();
        info!(
            "Uploading {} files to bundle {} in {} chunks",
            total_files,
            bundle_id,
            chunks.len()
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let uploaded_files = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let api = Arc::clone(&self.api);
            let observer = Arc::clone(&self.observer);
            let sem = Arc::clone(&semaphore);
            let uploaded = Arc::clone(&uploaded_files);
            let cancel = self.cancel.clone();
            let bundle_id = bundle_id.to_string();

            handles.push(tokio::spawn(async move {
                // Check cancellation before competing for a permit.
                if cancel.is_cancelled() {
                    return Err(SyncError::Cancelled);
                }

                let _permit = tokio::select! {
                    permit = sem.acquire() => permit.map_err(|_| SyncError::Cancelled)?,
                    _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                };

                let content: Vec<UploadedFile> = chunk
                    .iter()
                    .map(|f| UploadedFile {
                        file_hash: f.hash.clone(),
                        file_content: f.content.clone().unwrap_or_default(),
                    })
                    .collect();

                tokio::select! {
                    result = api.upload_files(&bundle_id, &content) => result?,
                    _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                }

                let done = uploaded.fetch_add(chunk.len(), Ordering::Relaxed) + chunk.len();
                observer.upload_progress(done, total_files);
                Ok::<(), SyncError>(())
            }));
        }

        let mut all_succeeded = true;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(SyncError::Cancelled)) => return Err(SyncError::Cancelled),
                Ok(Err(e)) => {
                    warn!("Upload chunk failed: {}", e);
                    all_succeeded = false;
                }
                Err(e) => {
                    warn!("Upload task panicked: {}", e);
                    all_succeeded = false;
                }
            }
        }

        Ok(all_succeeded)
    }
}
