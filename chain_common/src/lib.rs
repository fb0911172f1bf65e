//! Shared model, error type and SQLite store of the option-chain ingester and its report tool.
//!
//! The ingester writes snapshots through `store`, the report tool reads them back
//! through the same module, and both sides agree on the row shape in `model`.
//! Failures from the session bootstrap, the chain request, payload decoding,
//! pricing and SQLite all surface as one `ChainError`; `Result` defaults to it.
//! Endpoint, header and timeout settings for the chain source live in `source`.
#![warn(missing_docs)]
pub mod error;
pub mod model;
pub mod result;
pub mod source;
pub mod store;

pub use error::ChainError;
pub use model::{ContractType, EnrichedQuote, GreeksResult, OptionQuote, Snapshot};
pub use result::Result;
pub use store::SnapshotStore;
