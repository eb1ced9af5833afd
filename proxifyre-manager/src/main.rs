//! ProxiFyre manager.
//!
//! Entry point for the command line driver, which:
//! - Copies a stray `app-config.json` next to the executable
//! - Downloads and unpacks ProxiFyre releases
//! - Starts and stops ProxiFyre, directly or as a Windows service
//! - Edits the ProxiFyre configuration

use anyhow::Result;
use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use proxifyre_manager::cli::{self, Command};
use proxifyre_manager::paths::PathResolver;

/// ProxiFyre manager - fetch, install and supervise ProxiFyre
#[derive(Parser, Debug)]
#[command(name = "proxifyre-manager")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Run in verbose mode (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let paths = PathResolver::detect();
    match paths.ensure_config_colocated() {
        Ok(report) => debug!(
            outcome = ?report.outcome,
            binary_present = report.binary_present,
            "Startup check complete"
        ),
        Err(warning) => warn!(error = %warning, "Could not colocate configuration"),
    }

    cli::execute(args.command, &paths).await
}
