//! Remote option-chain source.
//!
//! - `session` — cookie bootstrap (`SessionManager`, `Session`).
//! - `fetcher` — authenticated chain fetch and payload parsing.
//!
//! `ChainSource` is the seam the scheduler pulls raw payloads through; `LiveSource`
//! runs a fresh session bootstrap followed by a fetch on every call.

pub mod fetcher;
pub mod session;

use crate::scheduler::{CycleError, Stage};
use crate::source::fetcher::{ChainFetcher, RawPayload};
use crate::source::session::SessionManager;

/// Produces one raw chain payload per cycle.
pub trait ChainSource {
    /// Obtain the raw payload, tagging failures with the stage that produced them.
    fn pull(&self) -> Result<RawPayload, CycleError>;
}

/// Network-backed source: session bootstrap then authenticated fetch.
pub struct LiveSource {
    sessions: SessionManager,
    fetcher: ChainFetcher,
}

impl LiveSource {
    /// Combine a session manager with a fetcher.
    pub fn new(sessions: SessionManager, fetcher: ChainFetcher) -> Self {
        Self { sessions, fetcher }
    }
}

impl ChainSource for LiveSource {
    fn pull(&self) -> Result<RawPayload, CycleError> {
        let session = self
            .sessions
            .acquire()
            .map_err(|e| CycleError::new(Stage::Session, e))?;
        self.fetcher
            .fetch(&session)
            .map_err(|e| CycleError::new(Stage::Fetch, e))
    }
}
