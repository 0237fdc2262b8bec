//! Single-range HTTP fetcher: one GET with a `Range` header, streamed read,
//! classified into `Transient` (retryable) or a hard `RangeLengthMismatch`.

use std::time::Duration;

use reqwest::header;

use crate::chunks::Range;
use crate::error::{DownloadError, Result};

pub const MIN_BACKOFF: Duration = Duration::from_secs(1);
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);
pub const BACKOFF_FACTOR: f64 = 1.5;

/// Per-worker backoff state. Starts at `MIN_BACKOFF`, multiplies by
/// `BACKOFF_FACTOR` on every transient failure up to `MAX_BACKOFF`, resets
/// to `MIN_BACKOFF` after any successful fetch.
pub struct Backoff {
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff {
            current: MIN_BACKOFF,
        }
    }
}

impl Backoff {
    pub fn reset(&mut self) {
        self.current = MIN_BACKOFF;
    }

    /// Sleeps for the current interval, then grows it for next time.
    pub async fn wait(&mut self) {
        tokio::time::sleep(self.current).await;
        let next = self.current.mul_f64(BACKOFF_FACTOR);
        self.current = next.min(MAX_BACKOFF);
    }
}

/// Performs one GET for `r`, returning exactly `r.size()` bytes.
///
/// Reads the body in arbitrary-size chunks, concatenating as they arrive —
/// never buffering more than one chunk beyond what's already been read.
/// Network errors and non-success statuses are `Transient`; a body whose
/// length disagrees with the requested range is `RangeLengthMismatch` and
/// is not retried by this function (the caller decides what to do with it).
pub async fn fetch_range(client: &reqwest::Client, url: &str, r: Range) -> Result<Vec<u8>> {
    let resp = client
        .get(url)
        .header(header::RANGE, format!("bytes={}-{}", r.lo, r.hi))
        .send()
        .await
        .map_err(|e| DownloadError::Transient(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(DownloadError::Transient(format!(
            "unexpected status {}",
            resp.status()
        )));
    }

    let expected = r.size();
    let mut buf = Vec::with_capacity(expected as usize);
    let mut resp = resp;
    while let Some(chunk) = resp
        .chunk()
        .await
        .map_err(|e| DownloadError::Transient(e.to_string()))?
    {
        buf.extend_from_slice(&chunk);
    }

    let got = buf.len() as u64;
    if got != expected {
        return Err(DownloadError::RangeLengthMismatch { expected, got });
    }

    Ok(buf)
}
