//! `pdl` CLI entry point.
//!
//! Parses arguments, wires up logging, and hands off to
//! [`pdl::coordinator::run`].

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use pdl::cli::Args;
use pdl::coordinator::Config;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    let cfg: Config = args.into();
    if let Err(e) = pdl::coordinator::run(cfg).await {
        error!(error = %e, "download failed");
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pdl={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
