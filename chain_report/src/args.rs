//! Command-line arguments for the snapshot report.
use std::path::PathBuf;

use clap::Parser;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// SQLite file written by the ingester.
    #[clap(long, default_value = "options.db")]
    pub db: PathBuf,

    /// Only strikes within this distance of spot are reported.
    #[clap(long, default_value_t = 600.0)]
    pub band: f64,
}
