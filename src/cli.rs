//! Command-line surface. Parses arguments and maps them onto a
//! `coordinator::Config`; no download logic lives here.

use std::path::PathBuf;

use clap::Parser;

use crate::coordinator::Config;

const MEG: u64 = 1024 * 1024;
const DEFAULT_WORKERS: usize = 5;
const DEFAULT_CHUNKSIZE_MB: u64 = 5;

/// The best downloader. Ever.
#[derive(Debug, Parser)]
#[command(name = "pdl", version, about)]
pub struct Args {
    /// URL to download.
    pub url: String,

    /// Where to store the downloaded content. Defaults to the basename of the URL path.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of concurrent workers.
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Chunk size in megabytes.
    #[arg(short, long, default_value_t = DEFAULT_CHUNKSIZE_MB)]
    pub chunksize: u64,

    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    pub debug: bool,

    /// Suppress the progress reporter.
    #[arg(short, long)]
    pub quiet: bool,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            url: args.url,
            output: args.output,
            workers: args.workers,
            chunk_size_bytes: args.chunksize * MEG,
            quiet: args.quiet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_flag_table() {
        let args = Args::parse_from(["pdl", "https://example.com/file.bin"]);
        assert_eq!(args.workers, 5);
        assert_eq!(args.chunksize, 5);
        assert!(!args.debug);
        assert!(!args.quiet);
        assert_eq!(args.output, None);
    }

    #[test]
    fn chunksize_is_converted_to_bytes() {
        let args = Args::parse_from([
            "pdl",
            "https://example.com/file.bin",
            "--chunksize",
            "16",
        ]);
        let cfg: Config = args.into();
        assert_eq!(cfg.chunk_size_bytes, 16 * MEG);
    }
}
