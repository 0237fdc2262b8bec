//! The crash-safe progress ledger.
//!
//! `LedgerState` is the plain, serializable record; `SharedLedger` is the
//! runtime wrapper that owns the mutex and the transient `url` field, the
//! same split the teacher uses between `Progress` (a DTO) and `EmitsInner`
//! (the mutex-guarded runtime state behind it).

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::chunks::{self, Range};
use crate::error::{DownloadError, Result};

/// Bumped whenever the on-disk layout of `LedgerState` changes. An unknown
/// version is treated the same as a corrupt file: fail fast, don't guess.
const LEDGER_VERSION: u16 = 1;

/// The persisted portion of a ledger: total size, the chunk size in effect
/// when the plan was last generated, and the completed set. Does not carry
/// the URL, any file handle, or any mutex state.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerState {
    version: u16,
    total_size: u64,
    chunk_size: u64,
    completed: Vec<Range>,
}

impl LedgerState {
    fn new(total_size: u64, chunk_size: u64) -> Self {
        LedgerState {
            version: LEDGER_VERSION,
            total_size,
            chunk_size,
            completed: Vec::new(),
        }
    }
}

/// Runtime-owning ledger: the data record plus the mutex that serializes
/// appends against `save`, plus the transient `url` field rebound on every
/// run.
pub struct SharedLedger {
    state: Mutex<LedgerState>,
    url: Mutex<String>,
}

impl SharedLedger {
    /// Creates a new, empty ledger for a download of `total_size` bytes,
    /// planned at `chunk_size`.
    pub fn new(total_size: u64, chunk_size: u64) -> Self {
        SharedLedger {
            state: Mutex::new(LedgerState::new(total_size, chunk_size)),
            url: Mutex::new(String::new()),
        }
    }

    /// Loads a ledger from its side-car file. Returns `LedgerAbsent` if the
    /// file doesn't exist (the caller should start fresh), `LedgerCorrupt`
    /// on any decoding failure or unknown format version.
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DownloadError::LedgerAbsent)
            }
            Err(e) => return Err(e.into()),
        };

        let state: LedgerState = bincode::deserialize(&bytes)
            .map_err(|e| DownloadError::LedgerCorrupt(e.to_string()))?;

        if state.version != LEDGER_VERSION {
            return Err(DownloadError::LedgerCorrupt(format!(
                "unknown ledger format version {}",
                state.version
            )));
        }

        Ok(SharedLedger {
            state: Mutex::new(state),
            url: Mutex::new(String::new()),
        })
    }

    /// Serializes the ledger to `path`. The caller is responsible for
    /// excluding concurrent appenders (the same mutex that guards `record`
    /// must be held across the whole save).
    pub async fn save(&self, path: &Path) -> Result<()> {
        let state = self.state.lock().await;
        let bytes = bincode::serialize(&*state)
            .map_err(|e| DownloadError::LedgerCorrupt(e.to_string()))?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    /// Appends a completed range. Does not re-sort or merge; that happens
    /// on load/save boundaries via `rechunkize`/compaction to keep the
    /// append path cheap.
    pub async fn record(&self, r: Range) {
        let mut state = self.state.lock().await;
        state.completed.push(r);
    }

    /// Compacts `completed` with `merge` and stores `new_chunk_size`.
    /// Called when a resumed run uses a different chunk size than the one
    /// recorded in the ledger.
    pub async fn rechunkize(&self, new_chunk_size: u64) {
        let mut state = self.state.lock().await;
        state.completed.sort();
        state.completed = chunks::merge(&state.completed);
        state.chunk_size = new_chunk_size;
    }

    /// `(downloaded_bytes, total_size)`.
    pub async fn status(&self) -> (u64, u64) {
        let state = self.state.lock().await;
        let downloaded = state.completed.iter().map(|r| r.size()).sum();
        (downloaded, state.total_size)
    }

    pub async fn total_size(&self) -> u64 {
        self.state.lock().await.total_size
    }

    pub async fn chunk_size(&self) -> u64 {
        self.state.lock().await.chunk_size
    }

    /// The plan entries not yet fully represented in `completed`, at the
    /// ledger's current chunk size.
    pub async fn outstanding(&self) -> Vec<Range> {
        let state = self.state.lock().await;
        chunks::outstanding(state.total_size, state.chunk_size, &state.completed)
    }

    /// Rebinds the transient source URL. Not persisted.
    pub async fn bind_url(&self, url: String) {
        *self.url.lock().await = url;
    }

    pub async fn url(&self) -> String {
        self.url.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::plan;

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempdir();
        let path = dir.join("test.download");

        let ledger = SharedLedger::new(1000, 100);
        ledger.record(Range::new(0, 99)).await;
        ledger.record(Range::new(100, 199)).await;
        ledger.save(&path).await.unwrap();

        let loaded = SharedLedger::load(&path).await.unwrap();
        assert_eq!(loaded.total_size().await, 1000);
        assert_eq!(loaded.chunk_size().await, 100);
        let (downloaded, total) = loaded.status().await;
        assert_eq!(downloaded, 200);
        assert_eq!(total, 1000);

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn load_absent_file_is_ledger_absent() {
        let err = SharedLedger::load(Path::new("/nonexistent/path/for/sure.download"))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::LedgerAbsent));
    }

    #[tokio::test]
    async fn load_corrupt_file_is_ledger_corrupt() {
        let dir = tempdir();
        let path = dir.join("corrupt.download");
        tokio::fs::write(&path, b"not a valid ledger").await.unwrap();

        let err = SharedLedger::load(&path).await.unwrap_err();
        assert!(matches!(err, DownloadError::LedgerCorrupt(_)));

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn resume_fidelity_matches_plan_minus_completed() {
        let ledger = SharedLedger::new(10, 3);
        ledger.record(Range::new(0, 2)).await;
        ledger.record(Range::new(6, 8)).await;

        let out = ledger.outstanding().await;
        assert_eq!(out, vec![Range::new(3, 5), Range::new(9, 9)]);
        assert_eq!(plan(10, 3).len(), 4);
    }

    #[tokio::test]
    async fn rechunkize_compacts_and_rebinds_chunk_size() {
        let ledger = SharedLedger::new(20, 5);
        ledger.record(Range::new(0, 4)).await;
        ledger.record(Range::new(5, 9)).await;

        ledger.rechunkize(10).await;
        assert_eq!(ledger.chunk_size().await, 10);

        let out = ledger.outstanding().await;
        // completed merged into (0,9), which matches the new chunk_size=10 plan's first entry
        assert_eq!(out, vec![Range::new(10, 19)]);
    }

    fn tempdir() -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        p.push(format!("pdl-ledger-test-{nanos}"));
        std::fs::create_dir_all(&p).unwrap();
        p
    }
}
