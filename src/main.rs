//! # nodesync
//!
//! Command-line driver for the upstream node-state reconciler. Reports are
//! applied against an in-memory registry, which makes the binary useful for
//! replaying captured edge traffic and checking how it would land.
//!
//! Ctrl+C cancels in-flight entries; entries not yet written are reported as
//! cancelled and nothing is left half-applied.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    commands::execute_command(cli.command).await
}

/// Initialize tracing subscriber with environment filter.
///
/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
