//! Bundle Sync - Main entry point
//!
//! Scans a directory tree and synchronizes it with the remote bundle service.

use anyhow::{Context, Result};
use bundle_sync::api::http::HttpBundleApi;
use bundle_sync::observer::SyncObserver;
use bundle_sync::{config::Config, sync, utils};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scan root; bundle paths are expressed relative to it
    root: PathBuf,

    /// Sub-paths to scan (defaults to the whole root)
    #[arg(short, long)]
    path: Vec<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Extend this bundle instead of creating a new one
    #[arg(short, long)]
    bundle_id: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

/// Observer that forwards progress to the log.
struct LogObserver;

impl SyncObserver for LogObserver {
    fn scan_progress(&self, files_processed: usize) {
        if files_processed % 100 == 0 {
            tracing::info!("Scanned {} files", files_processed);
        }
    }

    fn bundle_build_progress(&self, completed: usize, total: usize) {
        tracing::info!("Bundle build: {}/{} chunks", completed, total);
    }

    fn upload_progress(&self, uploaded: usize, total: usize) {
        tracing::info!("Uploaded {}/{} files", uploaded, total);
    }

    fn request_log(&self, message: &str) {
        tracing::debug!("{}", message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("cannot load config from {}", args.config.display()))?;

    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::info!(
        "Starting bundle-sync v{} against {}",
        env!("CARGO_PKG_VERSION"),
        config.server.url
    );

    let api = Arc::new(HttpBundleApi::new(
        config.server.url.clone(),
        config.server.token.clone(),
    )?);

    // Ctrl-C turns into a cancellation observed at every suspension point.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling synchronization");
            signal_cancel.cancel();
        }
    });

    let bundle = sync::synchronize_folder(
        api,
        Arc::new(LogObserver),
        &config.sync,
        &args.root,
        &args.path,
        args.bundle_id,
        cancel,
    )
    .await?;

    tracing::info!("Bundle converged: {}", bundle.bundle_id);
    println!("{}", bundle.bundle_id);

    Ok(())
}
