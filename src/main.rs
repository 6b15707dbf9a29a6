//! goban-infra CLI: synthesizes Terraform JSON for the Go session platform.

use clap::Parser;
use goban_infra::cli::{dispatch, Cli};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the command output.
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Err(e) = dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
