//! Snapshot report — reads the latest batch written by `chain_ingest` and logs
//! per-strike open interest, implied volatility and net gamma exposure around spot.
//!
//! Usage example (CLI):
//! ```bash
//! chain_report --db ./options.db --band 600
//! ```
#![warn(missing_docs)]
mod args;
mod exposure;

use crate::args::Args;
use crate::exposure::{strike_exposures, total_gex};
use chain_common::{Result, SnapshotStore};
use clap::Parser;
use log::{info, warn};

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();

    let store = SnapshotStore::open(&args.db)?;
    let Some(snapshot) = store.latest_snapshot()? else {
        warn!("Store is empty. Wait for the ingester to finish its first batch.");
        return Ok(());
    };

    info!(
        "Last updated: {} | Spot: {} | Expiry: {} | Rows: {}",
        snapshot.ingested_at.format("%H:%M:%S"),
        snapshot.underlying(),
        snapshot.expiry,
        snapshot.quotes.len()
    );

    let exposures = strike_exposures(&snapshot, args.band);
    for e in &exposures {
        info!(
            "{:>10.1}  CE OI {:>9}  PE OI {:>9}  CE IV {:>7}  PE IV {:>7}  GEX {:>12.2}",
            e.strike,
            e.call_oi,
            e.put_oi,
            format_iv(e.call_iv),
            format_iv(e.put_iv),
            e.net_gex
        );
    }
    info!("Net gamma exposure within ±{}: {:.2}", args.band, total_gex(&exposures));
    Ok(())
}

fn format_iv(iv: Option<f64>) -> String {
    iv.map(|v| format!("{:.2}%", v * 100.0))
        .unwrap_or_else(|| "-".to_string())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
