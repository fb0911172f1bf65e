//! Ingestion loop.
//!
//! One cycle runs source → parse → Greeks → persist sequentially. Any failure is
//! caught at the cycle boundary, logged with its stage, and the loop moves on to
//! the randomized sleep. Nothing is persisted for a failed cycle. The first cycle
//! starts immediately; the loop only ends on a shutdown signal or after an
//! optional cycle limit.

use std::path::PathBuf;
use std::time::Duration;

use chain_common::store::ingestion_timestamp;
use chain_common::{ChainError, EnrichedQuote, Snapshot, SnapshotStore};
use chrono::{NaiveDate, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{error, info, warn};
use rand::Rng;
use strum_macros::Display;
use thiserror::Error;

use crate::pricing::engine::GreeksEngine;
use crate::source::ChainSource;
use crate::source::fetcher::{WEEKLY_TIME_TO_EXPIRY, parse_chain};

/// Shortest pause between cycles, in seconds.
pub const MIN_SLEEP_SECS: u64 = 180;
/// Longest pause between cycles, in seconds.
pub const MAX_SLEEP_SECS: u64 = 240;

/// Step of a cycle, used to label failures.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Stage {
    Session,
    Fetch,
    Parse,
    Compute,
    Persist,
}

/// A failed cycle: the stage that failed and why.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct CycleError {
    /// Failing stage.
    pub stage: Stage,
    /// Underlying error.
    #[source]
    pub source: ChainError,
}

impl CycleError {
    /// Tag `source` with `stage`.
    pub fn new(stage: Stage, source: ChainError) -> Self {
        Self { stage, source }
    }
}

/// Outcome of a successful cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Rows appended to the store.
    pub rows: usize,
    /// Quotes whose IV could not be solved.
    pub iv_sentinels: usize,
    /// Spot price of the batch, if any rows were produced.
    pub underlying: Option<f64>,
    /// Expiry of the batch, if any rows were produced.
    pub expiry: Option<NaiveDate>,
}

/// Destination of enriched batches.
pub trait SnapshotSink {
    /// Append `rows` and return how many were written.
    fn persist(&mut self, rows: &[EnrichedQuote]) -> Result<usize, ChainError>;
}

impl SnapshotSink for SnapshotStore {
    fn persist(&mut self, rows: &[EnrichedQuote]) -> Result<usize, ChainError> {
        SnapshotStore::persist(self, rows)
    }
}

/// File-backed store that is (re)opened on demand.
///
/// An unavailable database fails the persist stage of a cycle instead of the
/// process; the connection is dropped after any write error and reopened on the
/// next cycle.
pub struct ReconnectingStore {
    path: PathBuf,
    store: Option<SnapshotStore>,
}

impl ReconnectingStore {
    /// Try to open `path` now; a failure is logged and retried on the next persist.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut sink = Self {
            path: path.into(),
            store: None,
        };
        if let Err(e) = sink.connect() {
            error!(
                "Snapshot store at {} unavailable: {}; retrying every cycle",
                sink.path.display(),
                e
            );
        }
        sink
    }

    /// Whether a connection is currently held.
    pub fn is_connected(&self) -> bool {
        self.store.is_some()
    }

    fn connect(&mut self) -> Result<&mut SnapshotStore, ChainError> {
        let store = match self.store.take() {
            Some(store) => store,
            None => SnapshotStore::open(&self.path)?,
        };
        Ok(self.store.insert(store))
    }
}

impl SnapshotSink for ReconnectingStore {
    fn persist(&mut self, rows: &[EnrichedQuote]) -> Result<usize, ChainError> {
        let result = self.connect().and_then(|store| store.persist(rows));
        if result.is_err() {
            self.store = None;
        }
        result
    }
}

/// Uniformly random pause between cycles.
#[derive(Debug, Clone, Copy)]
pub struct SleepPolicy {
    min_secs: u64,
    max_secs: u64,
}

impl SleepPolicy {
    /// Pauses drawn from `[min_secs, max_secs]`.
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs: min_secs.min(max_secs),
            max_secs: max_secs.max(min_secs),
        }
    }

    /// Draw the next pause.
    pub fn next_sleep(&self) -> Duration {
        let secs = rand::rng().random_range(self.min_secs..=self.max_secs);
        Duration::from_secs(secs)
    }
}

impl Default for SleepPolicy {
    fn default() -> Self {
        Self::new(MIN_SLEEP_SECS, MAX_SLEEP_SECS)
    }
}

/// Drives cycles forever (or up to a limit) with randomized sleeps in between.
pub struct Scheduler<S, W> {
    source: S,
    engine: GreeksEngine,
    sink: W,
    sleep: SleepPolicy,
    shutdown: Receiver<()>,
    max_cycles: Option<u64>,
}

impl<S: ChainSource, W: SnapshotSink> Scheduler<S, W> {
    /// Wire the stages together. A message (or disconnect) on `shutdown` ends
    /// the loop at the next sleep.
    pub fn new(
        source: S,
        engine: GreeksEngine,
        sink: W,
        sleep: SleepPolicy,
        shutdown: Receiver<()>,
    ) -> Self {
        Self {
            source,
            engine,
            sink,
            sleep,
            shutdown,
            max_cycles: None,
        }
    }

    /// Stop after `max_cycles` cycles; `None` runs until shutdown.
    pub fn with_max_cycles(mut self, max_cycles: Option<u64>) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Run cycles until shutdown or the cycle limit. Returns the number of cycles run.
    pub fn run(&mut self) -> u64 {
        let mut cycle: u64 = 0;
        loop {
            cycle += 1;
            match self.run_cycle() {
                Ok(report) => info!(
                    "Cycle {}: success! Loaded {} rows ({} without IV, spot {:?}, expiry {:?})",
                    cycle, report.rows, report.iv_sentinels, report.underlying, report.expiry
                ),
                Err(e) => log_failure(cycle, &e),
            }

            if self.max_cycles.is_some_and(|max| cycle >= max) {
                info!("Cycle limit reached after {} cycles", cycle);
                return cycle;
            }

            let pause = self.sleep.next_sleep();
            info!("Waiting {} seconds...", pause.as_secs());
            match self.shutdown.recv_timeout(pause) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    info!("Shutdown requested, stopping after {} cycles", cycle);
                    return cycle;
                }
            }
        }
    }

    /// One all-or-nothing cycle.
    pub fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let payload = self.source.pull()?;
        let quotes = parse_chain(&payload, WEEKLY_TIME_TO_EXPIRY)
            .map_err(|e| CycleError::new(Stage::Parse, e))?;
        if quotes.is_empty() {
            warn!("No quotes for the nearest expiry; nothing to persist");
            return Ok(CycleReport {
                rows: 0,
                iv_sentinels: 0,
                underlying: None,
                expiry: None,
            });
        }

        let ingested_at = ingestion_timestamp(Utc::now());
        let enriched = self.engine.compute(quotes, ingested_at);
        let snapshot = Snapshot::from_quotes(enriched)
            .map_err(|e| CycleError::new(Stage::Compute, e))?
            .ok_or_else(|| {
                CycleError::new(Stage::Compute, ChainError::Math("empty enriched batch".into()))
            })?;

        let rows = self
            .sink
            .persist(&snapshot.quotes)
            .map_err(|e| CycleError::new(Stage::Persist, e))?;

        Ok(CycleReport {
            rows,
            iv_sentinels: snapshot
                .quotes
                .iter()
                .filter(|q| q.greeks.implied_vol.is_none())
                .count(),
            underlying: Some(snapshot.underlying()),
            expiry: Some(snapshot.expiry),
        })
    }

    #[cfg(test)]
    fn sink(&self) -> &W {
        &self.sink
    }
}

fn log_failure(cycle: u64, e: &CycleError) {
    match e.source {
        ChainError::Blocked => warn!(
            "Cycle {}: blocked (401) at {} stage; a fresh session will be used next cycle",
            cycle, e.stage
        ),
        _ => error!("Cycle {}: {}", cycle, e),
    }
}
