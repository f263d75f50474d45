//! Bundle file scanning.
//!
//! Walks one or more directories beneath a scan root, applies ignore rules
//! and the supported-extension filter, hashes eligible files and yields
//! [`FileDescriptor`]s lazily. The iterator is a one-shot finite producer:
//! consume it once per scan and re-invoke [`scan_bundle_files`] to rescan.

use crate::config::OversizedFilePolicy;
use crate::fs::content::normalize_and_hash;
use crate::fs::ignore::IgnoreRuleSet;
use crate::observer::ObserverHandle;
use crate::utils::errors::{Result, SyncError};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// A single file in the bundle manifest.
///
/// Descriptors are created once per scan and never mutated; `content` is
/// populated lazily only when the file is about to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Absolute path on disk
    pub file_path: PathBuf,

    /// Root-relative path with forward slashes and a leading slash; this is
    /// the stable key shared with the remote bundle.
    pub bundle_path: String,

    /// Size of the raw file in bytes
    pub size: u64,

    /// SHA-256 of the encoding-normalized content, lowercase hex
    pub hash: String,

    /// Canonicalized content, present only when loaded for upload
    pub content: Option<String>,
}

/// Options controlling a scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Extensions eligible for bundling, without the dot (empty = all)
    pub supported_extensions: Vec<String>,

    /// Follow symbolic links
    pub follow_symlinks: bool,

    /// Files larger than this are never scanned into the manifest
    pub max_file_size: u64,

    /// Skip oversized files (reporting them) or fail the scan
    pub oversized_file_policy: OversizedFilePolicy,
}

impl ScanOptions {
    /// Whether a path passes the extension filter.
    pub fn extension_supported(&self, path: &Path) -> bool {
        if self.supported_extensions.is_empty() {
            return true;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.supported_extensions
            .iter()
            .any(|s| s.trim_start_matches('.') == ext)
    }
}

/// Build a descriptor for one file, hashing its normalized content.
///
/// `with_content` keeps the canonical text on the descriptor (used when the
/// file is about to be uploaded); otherwise only the hash is retained.
pub fn file_descriptor(
    file_path: &Path,
    root: &Path,
    with_content: bool,
) -> Result<FileDescriptor> {
    let bytes = std::fs::read(file_path)?;
    let size = bytes.len() as u64;
    let (content, hash) = normalize_and_hash(&bytes);

    Ok(FileDescriptor {
        file_path: file_path.to_path_buf(),
        bundle_path: to_bundle_path(file_path, root),
        size,
        hash,
        content: with_content.then_some(content),
    })
}

/// Root-relative forward-slash path with a leading slash.
pub fn to_bundle_path(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let joined = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    format!("/{joined}")
}

/// Absolute path for a bundle-relative path.
pub fn from_bundle_path(bundle_path: &str, root: &Path) -> PathBuf {
    root.join(bundle_path.trim_start_matches('/'))
}

/// Load content for exactly the given bundle-relative paths.
///
/// Used by the resolution loop to materialize missing files; unreadable
/// files are reported and skipped so one bad path cannot wedge the round.
pub fn resolve_bundle_files(
    root: &Path,
    bundle_paths: &[String],
    observer: &ObserverHandle,
) -> Vec<FileDescriptor> {
    let mut files = Vec::with_capacity(bundle_paths.len());
    for bundle_path in bundle_paths {
        let path = from_bundle_path(bundle_path, root);
        match file_descriptor(&path, root, true) {
            Ok(descriptor) => files.push(descriptor),
            Err(e) => {
                warn!("Cannot load {} for upload: {}", path.display(), e);
                observer.request_log(&format!("skipped unreadable file {bundle_path}"));
            }
        }
    }
    files
}

/// Scan `paths` beneath `root`, yielding descriptors lazily.
///
/// Emits a one-shot `supported_file_types_loaded` notification up front and
/// a monotonically increasing `scan_progress` count after each yielded file.
/// Directory order is lexicographic, so output order is deterministic.
pub fn scan_bundle_files<'a>(
    root: &Path,
    paths: &[PathBuf],
    rules: &'a IgnoreRuleSet,
    options: ScanOptions,
    observer: ObserverHandle,
) -> ScanIter<'a> {
    let types = if options.supported_extensions.is_empty() {
        None
    } else {
        Some(options.supported_extensions.clone())
    };
    observer.supported_file_types_loaded(types.as_deref());

    ScanIter {
        root: root.to_path_buf(),
        pending: paths.iter().rev().cloned().collect(),
        current: None,
        rules,
        options,
        observer,
        files_processed: 0,
    }
}

/// Lazy, one-shot scan iterator.
pub struct ScanIter<'a> {
    root: PathBuf,
    /// Remaining scan paths, popped back-to-front
    pending: Vec<PathBuf>,
    current: Option<walkdir::IntoIter>,
    rules: &'a IgnoreRuleSet,
    options: ScanOptions,
    observer: ObserverHandle,
    files_processed: usize,
}

impl ScanIter<'_> {
    fn next_walker(&mut self) -> Option<walkdir::IntoIter> {
        let path = self.pending.pop()?;
        Some(
            WalkDir::new(path)
                .follow_links(self.options.follow_symlinks)
                .sort_by_file_name()
                .into_iter(),
        )
    }
}

impl Iterator for ScanIter<'_> {
    type Item = Result<FileDescriptor>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(walker) = self.current.as_mut() else {
                self.current = Some(self.next_walker()?);
                continue;
            };

            let entry = match walker.next() {
                None => {
                    self.current = None;
                    continue;
                }
                Some(Err(e)) => {
                    // Unreadable entry: report and keep scanning.
                    warn!("Scan error: {}", e);
                    self.observer.request_log(&format!("scan error: {e}"));
                    continue;
                }
                Some(Ok(entry)) => entry,
            };

            if entry.file_type().is_dir() {
                // Prune ignored directories wholesale.
                if self.rules.is_ignored(entry.path()) {
                    walker.skip_current_dir();
                }
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }
            if self.rules.is_ignored(entry.path()) {
                continue;
            }
            if !self.options.extension_supported(entry.path()) {
                continue;
            }

            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(e) => {
                    warn!("Cannot stat {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            if size > self.options.max_file_size {
                let bundle_path = to_bundle_path(entry.path(), &self.root);
                warn!(
                    "Skipping oversized file {} ({} bytes > {} budget)",
                    bundle_path, size, self.options.max_file_size
                );
                self.observer
                    .request_log(&format!("oversized file skipped: {bundle_path}"));
                if self.options.oversized_file_policy == OversizedFilePolicy::Error {
                    return Some(Err(SyncError::OversizedFile {
                        path: bundle_path,
                        size,
                    }));
                }
                continue;
            }

            match file_descriptor(entry.path(), &self.root, false) {
                Ok(descriptor) => {
                    self.files_processed += 1;
                    self.observer.scan_progress(self.files_processed);
                    return Some(Ok(descriptor));
                }
                Err(e) => {
                    // Read failed between stat and read: report, continue.
                    warn!("Cannot read {}: {}", entry.path().display(), e);
                    self.observer
                        .request_log(&format!("unreadable file skipped: {e}"));
                    continue;
                }
            }
        }
    }
}
