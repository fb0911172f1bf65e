//! Command-line arguments for the chain ingester.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use std::path::PathBuf;

use chain_common::source::DEFAULT_SYMBOL;
use clap::Parser;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Index symbol whose option chain is harvested.
    #[clap(long, default_value = DEFAULT_SYMBOL)]
    pub symbol: String,

    /// Path of the SQLite file snapshots are appended to.
    #[clap(long, default_value = "options.db")]
    pub db: PathBuf,

    /// Stop after this many cycles instead of running until interrupted (at least 1).
    #[clap(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub cycles: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_run_until_interrupted() {
        let args = Args::try_parse_from(["chain_ingest"]).unwrap();
        assert_eq!(args.symbol, "NIFTY");
        assert_eq!(args.db, PathBuf::from("options.db"));
        assert_eq!(args.cycles, None);
    }

    #[test]
    fn zero_cycles_is_rejected() {
        assert!(Args::try_parse_from(["chain_ingest", "--cycles", "0"]).is_err());
        let args = Args::try_parse_from(["chain_ingest", "--cycles", "2"]).unwrap();
        assert_eq!(args.cycles, Some(2));
    }
}
