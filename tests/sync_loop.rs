//! End-to-end synchronization tests against an in-memory bundle service.

use async_trait::async_trait;
use bundle_sync::api::{BundleApi, FileHashes, RemoteBundle, UploadedFile};
use bundle_sync::config::SyncConfig;
use bundle_sync::fs::ignore::collect_ignore_rules;
use bundle_sync::fs::scanner::{scan_bundle_files, ScanOptions};
use bundle_sync::observer::NullObserver;
use bundle_sync::sync::{compose_payloads, synchronize_folder, BundleSynchronizer};
use bundle_sync::{Result, SyncError};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// In-memory bundle service. Content for a path is "missing" until uploaded;
/// paths listed in `reject_uploads` make the upload call fail outright.
#[derive(Default)]
struct InMemoryBundleService {
    state: Mutex<State>,
    reject_uploads: bool,
}

#[derive(Default)]
struct State {
    next_id: usize,
    bundles: BTreeMap<String, BTreeMap<String, String>>,
    received: BTreeSet<String>,
    upload_calls: usize,
    check_calls: usize,
}

impl InMemoryBundleService {
    fn rejecting() -> Self {
        Self {
            reject_uploads: true,
            ..Default::default()
        }
    }

    fn snapshot(state: &State, id: &str) -> RemoteBundle {
        let missing = state.bundles[id]
            .iter()
            .filter(|(_, hash)| !state.received.contains(*hash))
            .map(|(path, _)| path.clone())
            .collect();
        RemoteBundle {
            bundle_id: id.to_string(),
            missing_files: missing,
            upload_url: None,
        }
    }
}

#[async_trait]
impl BundleApi for InMemoryBundleService {
    async fn create_bundle(&self, files: &FileHashes) -> Result<RemoteBundle> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("bundle-{}", state.next_id);
        state
            .bundles
            .insert(id.clone(), files.clone().into_iter().collect());
        Ok(Self::snapshot(&state, &id))
    }

    async fn extend_bundle(
        &self,
        bundle_id: &str,
        files: &FileHashes,
        removed_files: &[String],
    ) -> Result<RemoteBundle> {
        let mut state = self.state.lock().unwrap();
        let Some(mut merged) = state.bundles.get(bundle_id).cloned() else {
            return Err(SyncError::Remote {
                status_code: 404,
                status_text: "bundle not found".into(),
            });
        };
        for (path, hash) in files {
            merged.insert(path.clone(), hash.clone());
        }
        for removed in removed_files {
            merged.remove(removed);
        }
        state.next_id += 1;
        let id = format!("bundle-{}", state.next_id);
        state.bundles.insert(id.clone(), merged);
        Ok(Self::snapshot(&state, &id))
    }

    async fn check_bundle(&self, bundle_id: &str) -> Result<RemoteBundle> {
        let mut state = self.state.lock().unwrap();
        state.check_calls += 1;
        if !state.bundles.contains_key(bundle_id) {
            return Err(SyncError::Remote {
                status_code: 404,
                status_text: "bundle not found".into(),
            });
        }
        Ok(Self::snapshot(&state, bundle_id))
    }

    async fn upload_files(&self, _bundle_id: &str, content: &[UploadedFile]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.upload_calls += 1;
        if self.reject_uploads {
            return Err(SyncError::Remote {
                status_code: 500,
                status_text: "storage unavailable".into(),
            });
        }
        for file in content {
            state.received.insert(file.file_hash.clone());
        }
        Ok(())
    }
}

fn sample_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("app.js"), "const a = 1;\n").unwrap();
    fs::write(dir.path().join("AnnotatorTest.java"), "class Annotator {}\n").unwrap();
    fs::create_dir(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/main.rs"), "fn main() {}\n").unwrap();
    dir
}

fn scan_options() -> ScanOptions {
    ScanOptions {
        supported_extensions: vec!["js".into(), "java".into(), "rs".into()],
        follow_symlinks: false,
        max_file_size: bundle_sync::config::MAX_PAYLOAD,
        oversized_file_policy: Default::default(),
    }
}

fn config() -> SyncConfig {
    SyncConfig {
        supported_extensions: vec!["js".into(), "java".into(), "rs".into()],
        ..SyncConfig::default()
    }
}

fn scan(dir: &Path) -> Vec<bundle_sync::FileDescriptor> {
    let rules = collect_ignore_rules(&[dir.to_path_buf()]).unwrap();
    scan_bundle_files(
        dir,
        &[dir.to_path_buf()],
        &rules,
        scan_options(),
        Arc::new(NullObserver),
    )
    .collect::<Result<Vec<_>>>()
    .unwrap()
}

#[test]
fn three_file_tree_yields_one_payload_with_reference_hashes() {
    let dir = sample_tree();
    let files = scan(dir.path());

    let payloads: Vec<_> = compose_payloads(files, bundle_sync::config::MAX_PAYLOAD).collect();
    assert_eq!(payloads.len(), 1);

    let by_path: BTreeMap<&str, &str> = payloads[0]
        .iter()
        .map(|f| (f.bundle_path.as_str(), f.hash.as_str()))
        .collect();
    assert_eq!(by_path.len(), 3);

    // SHA-256 of each file's canonicalized bytes.
    assert_eq!(
        by_path["/app.js"],
        "b79b14bd2584dd52b0f0ef042a2a4f104cda48330500e12237737cc51fbda43d"
    );
    assert_eq!(
        by_path["/AnnotatorTest.java"],
        "550e8d0297dfd276a29e51d71efdbc3cf3f3d8f361cff87fc693f716da0790f6"
    );
    assert_eq!(
        by_path["/src/main.rs"],
        "536e506bb90914c243a12b397b9a998f85ae2cbd9ba02dfd03a9e155ca5ca0f4"
    );
}

#[tokio::test]
async fn folder_sync_converges_end_to_end() {
    let dir = sample_tree();
    let api = Arc::new(InMemoryBundleService::default());

    let bundle = synchronize_folder(
        Arc::clone(&api) as Arc<dyn BundleApi>,
        Arc::new(NullObserver),
        &config(),
        dir.path(),
        &[],
        None,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(bundle.is_converged());
    let state = api.state.lock().unwrap();
    assert_eq!(state.received.len(), 3);
    assert_eq!(state.upload_calls, 1);
}

#[tokio::test]
async fn second_sync_of_unchanged_tree_uploads_nothing() {
    let dir = sample_tree();
    let api = Arc::new(InMemoryBundleService::default());

    let first = synchronize_folder(
        Arc::clone(&api) as Arc<dyn BundleApi>,
        Arc::new(NullObserver),
        &config(),
        dir.path(),
        &[],
        None,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let uploads_after_first = api.state.lock().unwrap().upload_calls;

    // Extending with identical content: server already holds every hash.
    let second = synchronize_folder(
        Arc::clone(&api) as Arc<dyn BundleApi>,
        Arc::new(NullObserver),
        &config(),
        dir.path(),
        &[],
        Some(first.bundle_id),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(second.is_converged());
    assert_eq!(api.state.lock().unwrap().upload_calls, uploads_after_first);
}

#[tokio::test]
async fn failed_upload_round_is_fatal_without_retries() {
    let dir = sample_tree();
    let api = Arc::new(InMemoryBundleService::rejecting());

    let synchronizer = BundleSynchronizer::new(
        Arc::clone(&api) as Arc<dyn BundleApi>,
        Arc::new(NullObserver),
        config(),
    );
    let result = synchronizer
        .synchronize(dir.path(), scan(dir.path()), Vec::new(), None)
        .await;

    assert!(matches!(result, Err(SyncError::UploadRoundFailed)));
    let state = api.state.lock().unwrap();
    // The failed round never re-checks and no further rounds run.
    assert_eq!(state.check_calls, 0);
    assert_eq!(state.upload_calls, 1);
}

#[tokio::test]
async fn modified_tree_extension_removes_and_replaces() {
    let dir = sample_tree();
    let api = Arc::new(InMemoryBundleService::default());

    let parent = synchronize_folder(
        Arc::clone(&api) as Arc<dyn BundleApi>,
        Arc::new(NullObserver),
        &config(),
        dir.path(),
        &[],
        None,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    // Mutate the tree: change one file, delete another.
    fs::write(dir.path().join("app.js"), "const a = 2;\n").unwrap();
    fs::remove_file(dir.path().join("AnnotatorTest.java")).unwrap();

    let rules = collect_ignore_rules(&[dir.path().to_path_buf()]).unwrap();
    let diff = bundle_sync::sync::prepare_extension(
        dir.path(),
        &[
            "/app.js".to_string(),
            "/AnnotatorTest.java".to_string(),
            "/src/main.rs".to_string(),
        ],
        &rules,
        &scan_options(),
    );
    assert_eq!(diff.removed_files, vec!["/AnnotatorTest.java"]);

    let synchronizer = BundleSynchronizer::new(
        Arc::clone(&api) as Arc<dyn BundleApi>,
        Arc::new(NullObserver),
        config(),
    );
    let bundle = synchronizer
        .synchronize(
            dir.path(),
            diff.files,
            diff.removed_files,
            Some(parent.bundle_id),
        )
        .await
        .unwrap();

    assert!(bundle.is_converged());
    let state = api.state.lock().unwrap();
    let manifest = state.bundles.values().last().unwrap();
    assert!(!manifest.contains_key("/AnnotatorTest.java"));
    assert!(manifest.contains_key("/app.js"));
    assert!(manifest.contains_key("/src/main.rs"));
}
