//! Option-chain ingester.
//!
//! This binary harvests the nearest-expiry option chain of an index every few
//! minutes, solves implied volatility and delta/gamma for every contract and
//! appends the batch to a SQLite store. Internally it wires together:
//!
//! - `SessionManager` — visits the landing page for cookies before each fetch.
//! - `ChainFetcher` — authenticated chain request and payload parsing.
//! - `GreeksEngine` — batch IV solve and closed-form Greeks.
//! - `ReconnectingStore` — append-only persistence of each batch, reopened on failure.
//! - `Scheduler` — runs cycles with a randomized 180–240 s pause, isolating failures.
//!
//! Usage example (CLI):
//! ```bash
//! chain_ingest --symbol NIFTY --db ./options.db
//! ```
//!
//! Ctrl+C stops the loop at the next pause; a running cycle is allowed to finish.
#![warn(missing_docs)]
mod args;
mod pricing;
mod scheduler;
mod source;

use crate::args::Args;
use crate::pricing::engine::{GreeksEngine, RISK_FREE_RATE};
use crate::scheduler::{ReconnectingStore, Scheduler, SleepPolicy};
use crate::source::LiveSource;
use crate::source::fetcher::ChainFetcher;
use crate::source::session::SessionManager;
use clap::Parser;
use crossbeam_channel::bounded;
use log::info;

fn main() {
    init_logger();
    let args = Args::parse();

    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Stopping after the current cycle...");
        let _ = shutdown_tx.try_send(());
    })
    .expect("Error setting Ctrl+C handler");

    let store = ReconnectingStore::open(&args.db);
    let source = LiveSource::new(SessionManager::new(), ChainFetcher::new(&args.symbol));
    let engine = GreeksEngine::new(RISK_FREE_RATE);

    info!(
        "Starting ingestion for {} (rate {}, store {})",
        args.symbol,
        engine.risk_free_rate(),
        args.db.display()
    );
    let mut scheduler = Scheduler::new(source, engine, store, SleepPolicy::default(), shutdown_rx)
        .with_max_cycles(args.cycles);
    let cycles = scheduler.run();
    info!("Ingester stopped after {} cycles", cycles);
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
