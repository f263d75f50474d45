//! Size-bounded payload composition.
//!
//! Groups scanned descriptors into upload batches whose summed
//! overhead-adjusted size stays within the payload budget, and computes the
//! new/removed diff used when extending an existing bundle.

use crate::config::UPLOAD_FILE_OVERHEAD;
use crate::fs::ignore::IgnoreRuleSet;
use crate::fs::scanner::{file_descriptor, from_bundle_path, FileDescriptor, ScanOptions};
use std::path::Path;
use tracing::warn;

/// Greedily batch `files` in order; a batch closes when the next descriptor
/// would push it past `max_payload_bytes`.
///
/// Invariants: input order is preserved, no batch is empty, and the
/// concatenation of all batches equals the input minus oversized exclusions.
/// A descriptor that alone exceeds the budget can never be uploaded; it is
/// dropped here with a warning rather than silently split.
pub fn compose_payloads<I>(files: I, max_payload_bytes: u64) -> Payloads<I::IntoIter>
where
    I: IntoIterator<Item = FileDescriptor>,
{
    Payloads {
        files: files.into_iter(),
        carry: None,
        max_payload_bytes,
    }
}

/// Lazy batch iterator returned by [`compose_payloads`].
pub struct Payloads<I: Iterator<Item = FileDescriptor>> {
    files: I,
    /// Descriptor that closed the previous batch and opens the next one
    carry: Option<FileDescriptor>,
    max_payload_bytes: u64,
}

impl<I: Iterator<Item = FileDescriptor>> Iterator for Payloads<I> {
    type Item = Vec<FileDescriptor>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut batch = Vec::new();
        let mut batch_bytes = 0u64;

        loop {
            let Some(file) = self.carry.take().or_else(|| self.files.next()) else {
                return (!batch.is_empty()).then_some(batch);
            };

            let weight = file.size + UPLOAD_FILE_OVERHEAD;
            if weight > self.max_payload_bytes {
                warn!(
                    "Excluding {} from payloads: {} bytes exceeds the {} budget",
                    file.bundle_path, file.size, self.max_payload_bytes
                );
                continue;
            }

            if batch_bytes + weight > self.max_payload_bytes && !batch.is_empty() {
                self.carry = Some(file);
                return Some(batch);
            }

            batch_bytes += weight;
            batch.push(file);
        }
    }
}

/// Diff of the local tree against a parent bundle's file list.
#[derive(Debug, Default)]
pub struct ExtensionDiff {
    /// Parent paths still present and eligible, rescanned (new or changed)
    pub files: Vec<FileDescriptor>,

    /// Parent bundle-relative paths no longer present or eligible
    pub removed_files: Vec<String>,
}

/// Classify each parent bundle path as still-present (rescanned into a
/// descriptor) or removed.
///
/// A path counts as removed when it is gone from disk, unreadable, ignored,
/// or filtered out by the extension and size rules; the server must drop it
/// from the bundle either way.
pub fn prepare_extension(
    root: &Path,
    parent_bundle_paths: &[String],
    rules: &IgnoreRuleSet,
    options: &ScanOptions,
) -> ExtensionDiff {
    let mut diff = ExtensionDiff::default();

    for bundle_path in parent_bundle_paths {
        let path = from_bundle_path(bundle_path, root);

        let eligible = path.is_file()
            && !rules.is_ignored(&path)
            && options.extension_supported(&path)
            && std::fs::metadata(&path)
                .map(|m| m.len() <= options.max_file_size)
                .unwrap_or(false);

        if !eligible {
            diff.removed_files.push(bundle_path.clone());
            continue;
        }

        match file_descriptor(&path, root, false) {
            Ok(descriptor) => diff.files.push(descriptor),
            Err(e) => {
                warn!("Cannot rescan {}: {}", path.display(), e);
                diff.removed_files.push(bundle_path.clone());
            }
        }
    }

    diff
}
