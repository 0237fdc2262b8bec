//! Orchestrates one invocation: HEAD for size, load/create the ledger,
//! open/truncate the output file, spawn the worker pool, and finalize.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::header;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{DownloadError, Result};
use crate::ledger::SharedLedger;
use crate::report;
use crate::workers::{self, PoolShared};

/// 20,000 MiB. Guards against accidentally targeting an effectively
/// infinite stream.
pub const SIZE_CEILING_BYTES: u64 = 20_000 * 1024 * 1024;

/// Configuration for a single download run, bound directly from CLI flags.
#[derive(Debug, Clone)]
pub struct Config {
    pub url: String,
    pub output: Option<PathBuf>,
    pub workers: usize,
    pub chunk_size_bytes: u64,
    pub quiet: bool,
}

/// Runs one download to completion. Returns `Ok(())` on success, including
/// the "already downloaded" no-op case.
pub async fn run(cfg: Config) -> Result<()> {
    let outfile = cfg
        .output
        .clone()
        .unwrap_or_else(|| basename_of(&cfg.url));
    let statusfile = sidecar_path(&outfile);

    if outfile.exists() && !statusfile.exists() {
        info!(path = %outfile.display(), "already downloaded");
        return Ok(());
    }

    if !outfile.exists() && statusfile.exists() {
        return Err(DownloadError::OrphanLedger);
    }

    let client = reqwest::Client::builder().build()?;

    let total_size = head_content_length(&client, &cfg.url).await?;
    if total_size >= SIZE_CEILING_BYTES {
        return Err(DownloadError::SizeSuspicious(total_size));
    }

    let ledger = match SharedLedger::load(&statusfile).await {
        Ok(ledger) => {
            let expected = ledger.total_size().await;
            if expected != total_size {
                return Err(DownloadError::SizeMismatch {
                    expected,
                    found: total_size,
                });
            }
            if ledger.chunk_size().await != cfg.chunk_size_bytes {
                info!(
                    old = ledger.chunk_size().await,
                    new = cfg.chunk_size_bytes,
                    "chunk size changed, rechunkizing ledger"
                );
                ledger.rechunkize(cfg.chunk_size_bytes).await;
            }
            ledger
        }
        Err(DownloadError::LedgerAbsent) => {
            SharedLedger::new(total_size, cfg.chunk_size_bytes)
        }
        Err(other) => return Err(other),
    };
    ledger.bind_url(cfg.url.clone()).await;
    let ledger = Arc::new(ledger);

    let file = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .read(true)
        .open(&outfile)
        .await?;
    file.set_len(total_size).await?;

    let outstanding: VecDeque<_> = ledger.outstanding().await.into_iter().collect();
    let shared = Arc::new(PoolShared {
        client,
        url: cfg.url.clone(),
        queue: Mutex::new(outstanding),
        file: Mutex::new(file),
        ledger: ledger.clone(),
    });

    let reporter = if cfg.quiet {
        None
    } else {
        Some(report::spawn(ledger.clone()))
    };

    let result = tokio::select! {
        res = workers::run(shared, cfg.workers) => res,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, flushing ledger");
            Err(DownloadError::Interrupted)
        }
    };

    if let Some(handle) = reporter {
        handle.abort();
    }

    match result {
        Ok(()) => {
            match tokio::fs::remove_file(&statusfile).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            info!(path = %outfile.display(), "download complete");
            Ok(())
        }
        Err(fatal) => {
            ledger.save(&statusfile).await?;
            Err(fatal)
        }
    }
}

async fn head_content_length(client: &reqwest::Client, url: &str) -> Result<u64> {
    let resp = client
        .head(url)
        .send()
        .await
        .map_err(|e| DownloadError::Transient(e.to_string()))?;

    resp.headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or(DownloadError::NoContentLength)
}

fn sidecar_path(outfile: &Path) -> PathBuf {
    let mut s = outfile.as_os_str().to_owned();
    s.push(".download");
    PathBuf::from(s)
}

fn basename_of(url: &str) -> PathBuf {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let name = without_query
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("download");
    PathBuf::from(name)
}
