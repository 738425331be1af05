//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shadow_rs::shadow;

// Include shadow-rs generated build information
shadow!(build);

#[derive(Debug, Parser)]
#[command(
    name = "metronome",
    about = "Distributed CRON-style job scheduler with webhook delivery",
    version = build::PKG_VERSION,
    long_version = build::CLAP_LONG_VERSION
)]
pub struct Cli {
    /// Path to a configuration file (skips layered config loading)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the scheduler process: admin API and dispatcher loop
    Serve,
    /// Run a worker process: claim loop, execution pool, retry promoter
    Work,
    /// Run pending database migrations and exit
    Migrate,
}
