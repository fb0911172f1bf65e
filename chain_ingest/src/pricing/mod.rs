//! Option pricing for the ingester.
//!
//! - `black_scholes` — closed-form prices, delta/gamma and the IV root finder.
//! - `engine` — batch enrichment of a cycle's quotes (`GreeksEngine`).

pub mod black_scholes;
pub mod engine;
