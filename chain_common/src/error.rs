//! Error types shared between the ingester and the report tool.
//!
//! The `ChainError` enum mirrors the failure taxonomy of one ingestion cycle:
//! session bootstrap, fetch classification, payload parsing, numeric faults and
//! persistence. Every kind except `Math` aborts only the current cycle.
use std::io;

use thiserror::Error;

/// Unified error type shared by all crates in the workspace.
#[derive(Error, Debug)]
pub enum ChainError {
    /// Source unreachable (landing page or chain endpoint transport failure).
    #[error("Connection error: {0}")]
    Connection(String),

    /// The source answered 401, which signals anti-automation detection.
    #[error("Blocked by source (HTTP 401)")]
    Blocked,

    /// Any other non-2xx response from the chain endpoint.
    #[error("HTTP error: status {0}")]
    Http(u16),

    /// Outbound request exceeded its timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Payload has an unexpected shape or content.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Failure while decoding JSON via serde_json.
    #[error("JSON decode error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Implied volatility or Greeks computation fault.
    #[error("Math error: {0}")]
    Math(String),

    /// Durable store failure (connectivity, schema, constraint).
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// I/O error originating from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ChainError {
    /// Returns `true` for failures that come from payload decoding.
    pub fn is_parse(&self) -> bool {
        matches!(self, ChainError::Parse(_) | ChainError::SerdeJson(_))
    }
}
