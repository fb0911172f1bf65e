//! `Result` with `ChainError` as the default error.
use crate::error::ChainError;

/// Outcome of any fetch, pricing or store call.
pub type Result<T, E = ChainError> = std::result::Result<T, E>;
