//! Background progress reporter. Samples `status()` every ~5s and prints a
//! human-readable line; has no effect on correctness and is cancelled as
//! soon as the worker pool completes.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::ledger::SharedLedger;

const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Spawns the periodic reporter and returns a handle; drop or abort it once
/// the download finishes.
pub fn spawn(ledger: Arc<SharedLedger>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let bar = ProgressBar::new(ledger.total_size().await);
        bar.set_style(
            ProgressStyle::with_template(
                "{bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, eta {eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        loop {
            let (downloaded, total) = ledger.status().await;
            bar.set_length(total);
            bar.set_position(downloaded);
            if downloaded >= total {
                bar.finish_and_clear();
                break;
            }
            tokio::time::sleep(REPORT_INTERVAL).await;
        }
    })
}
