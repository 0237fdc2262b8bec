//! Error types for the download coordinator.
//!
//! Every failure mode named in the design is a variant here so that callers
//! can match on `DownloadError` instead of string-sniffing a boxed error.

use thiserror::Error;

/// All ways a download can fail.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Retryable: network error, connection reset, or an unexpected non-success status.
    #[error("transient error: {0}")]
    Transient(String),

    /// The response body length didn't match the requested range. Not retryable.
    #[error("range length mismatch: expected {expected} bytes, got {got}")]
    RangeLengthMismatch { expected: u64, got: u64 },

    /// No side-car file exists yet. Handled internally: the coordinator starts fresh.
    #[error("no ledger present")]
    LedgerAbsent,

    /// The side-car file exists but could not be decoded.
    #[error("ledger corrupt: {0}")]
    LedgerCorrupt(String),

    /// HEAD size doesn't match the size recorded in a resumed ledger.
    #[error("size mismatch: ledger expects {expected} bytes, server reports {found}")]
    SizeMismatch { expected: u64, found: u64 },

    /// A side-car file exists but the output file it describes is missing.
    #[error("orphan ledger: found a status file but no output file; remove it to start over")]
    OrphanLedger,

    /// HEAD reported a size beyond the sanity ceiling.
    #[error("size suspicious: {0} bytes exceeds the sanity ceiling")]
    SizeSuspicious(u64),

    /// HEAD response lacked a usable `Content-Length`.
    #[error("server did not report a numeric Content-Length")]
    NoContentLength,

    /// The run was cancelled (e.g. Ctrl-C). The ledger has been flushed.
    #[error("download interrupted")]
    Interrupted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DownloadError>;
