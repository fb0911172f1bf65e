//! Batch implied volatility and Greeks over one cycle's quotes.
//!
//! The batch is solved element by element: a quote whose premium cannot be
//! inverted gets the `None` sentinel and is priced at zero volatility, without
//! touching any other quote. A fault in the Greeks pass itself (degenerate
//! inputs, non-finite output) zeroes IV, delta and gamma for the whole batch.

use chain_common::{ChainError, EnrichedQuote, GreeksResult, OptionQuote};
use chrono::{DateTime, Utc};
use log::{debug, error};

use crate::pricing::black_scholes;

/// Annual risk-free rate used for every solve.
pub const RISK_FREE_RATE: f64 = 0.10;

/// Volatility used for Greeks when the IV solve failed.
pub const FALLBACK_VOL: f64 = 0.0;

/// Solves IV and computes delta/gamma for batches of quotes.
pub struct GreeksEngine {
    risk_free_rate: f64,
}

impl GreeksEngine {
    /// Create an engine pricing with `risk_free_rate`.
    pub fn new(risk_free_rate: f64) -> Self {
        Self { risk_free_rate }
    }

    /// Rate used by this engine.
    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    /// Implied volatility per quote; `None` where the solve does not converge.
    pub fn solve_implied_vols(&self, quotes: &[OptionQuote]) -> Vec<Option<f64>> {
        quotes
            .iter()
            .map(|q| {
                let iv = black_scholes::implied_volatility(
                    q.contract_type,
                    q.premium,
                    q.underlying,
                    q.strike,
                    self.risk_free_rate,
                    q.time_to_expiry,
                );
                if iv.is_none() {
                    debug!(
                        "IV unsolved for {} {} (premium {}, spot {})",
                        q.contract_type, q.strike, q.premium, q.underlying
                    );
                }
                iv
            })
            .collect()
    }

    /// Delta and gamma for every quote at its solved volatility (or the fallback).
    ///
    /// Fails as a whole if any single computation faults.
    pub fn compute_greeks(
        &self,
        quotes: &[OptionQuote],
        vols: &[Option<f64>],
    ) -> Result<Vec<GreeksResult>, ChainError> {
        if quotes.len() != vols.len() {
            return Err(ChainError::Math(format!(
                "{} quotes but {} volatilities",
                quotes.len(),
                vols.len()
            )));
        }

        quotes
            .iter()
            .zip(vols)
            .map(|(q, iv)| {
                let g = black_scholes::greeks(
                    q.contract_type,
                    q.underlying,
                    q.strike,
                    self.risk_free_rate,
                    iv.unwrap_or(FALLBACK_VOL),
                    q.time_to_expiry,
                )?;
                Ok(GreeksResult {
                    implied_vol: *iv,
                    delta: g.delta,
                    gamma: g.gamma,
                })
            })
            .collect()
    }

    /// Enrich a batch, stamping every row with `ingested_at`.
    pub fn compute(&self, quotes: Vec<OptionQuote>, ingested_at: DateTime<Utc>) -> Vec<EnrichedQuote> {
        let vols = self.solve_implied_vols(&quotes);
        let results = match self.compute_greeks(&quotes, &vols) {
            Ok(results) => results,
            Err(e) => {
                error!("Math error, zeroing IV and Greeks for {} quotes: {}", quotes.len(), e);
                vec![GreeksResult::zeroed(); quotes.len()]
            }
        };

        quotes
            .into_iter()
            .zip(results)
            .map(|(quote, greeks)| EnrichedQuote {
                quote,
                greeks,
                ingested_at,
            })
            .collect()
    }
}

impl Default for GreeksEngine {
    fn default() -> Self {
        Self::new(RISK_FREE_RATE)
    }
}
