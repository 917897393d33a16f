//! CLI command definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// nodesync - upstream node-state reconciler
#[derive(Parser, Debug)]
#[command(name = "nodesync")]
#[command(version)]
#[command(about = "Fold edge node reports into a node registry")]
#[command(
    long_about = "nodesync decodes node reports sent by edge clusters and reconciles them into a node registry, accepting only strictly newer edge-versions and retrying on write conflicts."
)]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply report files, in order, against an in-memory registry
    Apply {
        /// Reconciler config file (TOML, or JSON by extension)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// JSON array of nodes to preload into the registry
        #[arg(short, long)]
        seed: Option<PathBuf>,

        /// Report files to apply
        #[arg(required = true)]
        reports: Vec<PathBuf>,
    },

    /// Decode a report file and print its entries
    Decode {
        /// Report file
        report: PathBuf,
    },
}
