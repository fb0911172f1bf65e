//! Per-strike aggregation of the latest snapshot.
//!
//! Open interest is split by leg; net gamma exposure sums each leg's signed
//! `gamma * OI * 100` (calls positive, puts negative).

use std::collections::BTreeMap;

use chain_common::{ContractType, Snapshot};

/// Aggregated view of one strike.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrikeExposure {
    /// Exercise price.
    pub strike: f64,
    /// Call open interest.
    pub call_oi: u64,
    /// Put open interest.
    pub put_oi: u64,
    /// Call implied volatility, if solved.
    pub call_iv: Option<f64>,
    /// Put implied volatility, if solved.
    pub put_iv: Option<f64>,
    /// Net gamma exposure across both legs.
    pub net_gex: f64,
}

/// Strikes within `band` of spot, ordered by strike.
pub fn strike_exposures(snapshot: &Snapshot, band: f64) -> Vec<StrikeExposure> {
    let spot = snapshot.underlying();
    let mut by_strike: BTreeMap<u64, StrikeExposure> = BTreeMap::new();

    for row in &snapshot.quotes {
        let q = &row.quote;
        if (q.strike - spot).abs() >= band {
            continue;
        }
        // strikes are positive, so the bit pattern orders like the value
        let entry = by_strike.entry(q.strike.to_bits()).or_insert_with(|| StrikeExposure {
            strike: q.strike,
            ..Default::default()
        });
        match q.contract_type {
            ContractType::Call => {
                entry.call_oi = q.open_interest;
                entry.call_iv = row.greeks.implied_vol;
            }
            ContractType::Put => {
                entry.put_oi = q.open_interest;
                entry.put_iv = row.greeks.implied_vol;
            }
        }
        entry.net_gex += row.gamma_exposure();
    }

    by_strike.into_values().collect()
}

/// Sum of net gamma exposure over `exposures`.
pub fn total_gex(exposures: &[StrikeExposure]) -> f64 {
    exposures.iter().map(|e| e.net_gex).sum()
}
