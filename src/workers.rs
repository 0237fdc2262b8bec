//! The worker pool: N concurrent fetchers pulling from a shared queue,
//! writing into the output file under a single write mutex, and recording
//! completion in the ledger.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::chunks::Range;
use crate::error::{DownloadError, Result};
use crate::fetch::{fetch_range, Backoff};
use crate::ledger::SharedLedger;

/// A chunk whose fetch failed with a non-retryable error. The worker that
/// hit it terminates; the overall download is reported as failed.
#[derive(Debug)]
pub struct FatalChunkError {
    pub range: Range,
    pub source: DownloadError,
}

impl std::fmt::Display for FatalChunkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chunk {:?} failed fatally: {}", self.range, self.source)
    }
}

impl std::error::Error for FatalChunkError {}

/// Shared state handed to every worker task.
pub struct PoolShared {
    pub client: reqwest::Client,
    pub url: String,
    pub queue: Mutex<VecDeque<Range>>,
    pub file: Mutex<File>,
    pub ledger: Arc<SharedLedger>,
}

/// Runs `num_workers` concurrent fetchers against `shared` until the queue
/// is drained or a fatal error is hit. Returns `Ok(())` if every chunk in
/// the queue was fetched and recorded; the first fatal error otherwise.
pub async fn run(shared: Arc<PoolShared>, num_workers: usize) -> Result<()> {
    let mut tasks = FuturesUnordered::new();
    for id in 0..num_workers {
        let shared = shared.clone();
        tasks.push(tokio::spawn(worker_loop(id, shared)));
    }

    let mut first_err: Option<DownloadError> = None;
    while let Some(joined) = tasks.next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(fatal)) => {
                if first_err.is_none() {
                    first_err = Some(fatal.source);
                }
            }
            Err(join_err) => {
                if first_err.is_none() {
                    first_err = Some(DownloadError::Transient(join_err.to_string()));
                }
            }
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// IDLE -> FETCHING -> WRITING -> RECORDED -> IDLE, with a BACKING_OFF
/// detour on transient errors and TERMINATED on a fatal one.
async fn worker_loop(
    id: usize,
    shared: Arc<PoolShared>,
) -> std::result::Result<(), FatalChunkError> {
    let mut backoff = Backoff::default();

    loop {
        let next = shared.queue.lock().await.pop_front();
        let range = match next {
            Some(r) => r,
            None => {
                debug!(worker = id, "queue empty, worker done");
                return Ok(());
            }
        };

        debug!(worker = id, ?range, "fetching chunk");
        let buf = loop {
            match fetch_range(&shared.client, &shared.url, range).await {
                Ok(buf) => break buf,
                Err(DownloadError::RangeLengthMismatch { expected, got }) => {
                    return Err(FatalChunkError {
                        range,
                        source: DownloadError::RangeLengthMismatch { expected, got },
                    });
                }
                Err(transient) => {
                    warn!(worker = id, ?range, error = %transient, "transient fetch error, backing off");
                    backoff.wait().await;
                    continue;
                }
            }
        };

        {
            let mut file = shared.file.lock().await;
            file.seek(std::io::SeekFrom::Start(range.lo))
                .await
                .map_err(|e| FatalChunkError {
                    range,
                    source: e.into(),
                })?;
            file.write_all(&buf).await.map_err(|e| FatalChunkError {
                range,
                source: e.into(),
            })?;
        }

        shared.ledger.record(range).await;
        debug!(worker = id, ?range, "chunk recorded");
        backoff.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::plan;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn drains_queue_and_writes_bytes_in_order() {
        let data = b"abcdefghijklmnopqrstuvwxyz0123456789".to_vec();
        let server = MockServer::start().await;

        for r in plan(data.len() as u64, 8) {
            let body = data[r.lo as usize..=r.hi as usize].to_vec();
            Mock::given(method("GET"))
                .and(path_regex(r"^/file$"))
                .respond_with(move |req: &wiremock::Request| {
                    let range_header = req
                        .headers
                        .get("Range")
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    let expect = format!("bytes={}-{}", r.lo, r.hi);
                    if range_header == expect {
                        ResponseTemplate::new(206).set_body_bytes(body.clone())
                    } else {
                        ResponseTemplate::new(500)
                    }
                })
                .mount(&server)
                .await;
        }

        let dir = std::env::temp_dir().join(format!(
            "pdl-worker-test-{}",
            std::process::id()
        ));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let out_path = dir.join("out.bin");
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .truncate(true)
            .open(&out_path)
            .await
            .unwrap();
        file.set_len(data.len() as u64).await.unwrap();

        let ledger = Arc::new(SharedLedger::new(data.len() as u64, 8));
        let mut queue = VecDeque::new();
        for r in plan(data.len() as u64, 8) {
            queue.push_back(r);
        }

        let shared = Arc::new(PoolShared {
            client: reqwest::Client::new(),
            url: format!("{}/file", server.uri()),
            queue: Mutex::new(queue),
            file: Mutex::new(file),
            ledger: ledger.clone(),
        });

        run(shared, 3).await.unwrap();

        let written = tokio::fs::read(&out_path).await.unwrap();
        assert_eq!(written, data);

        let (downloaded, total) = ledger.status().await;
        assert_eq!(downloaded, total);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
