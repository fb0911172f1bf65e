//! Option-chain data model.
//!
//! A cycle turns raw chain entries into `OptionQuote`s, attaches a `GreeksResult`
//! to each one and stamps the batch with a single ingestion time, producing
//! `EnrichedQuote`s. The rows sharing one timestamp form a `Snapshot`.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::ChainError;

/// Contract multiplier used by the gamma-exposure proxy.
pub const GEX_CONTRACT_MULTIPLIER: f64 = 100.0;

/// Call or put leg of a strike.
///
/// The string form is the source's type code (`CE`/`PE`).
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, Hash, Eq, PartialEq,
)]
pub enum ContractType {
    /// Call option (`CE`).
    #[strum(serialize = "CE")]
    #[serde(rename = "CE")]
    Call,
    /// Put option (`PE`).
    #[strum(serialize = "PE")]
    #[serde(rename = "PE")]
    Put,
}

impl ContractType {
    /// Single-letter pricing flag (`c`/`p`) persisted next to the type code.
    pub fn flag(&self) -> &'static str {
        match self {
            ContractType::Call => "c",
            ContractType::Put => "p",
        }
    }

    /// Sign applied to gamma exposure: dealers are assumed short calls and long puts.
    pub fn dealer_sign(&self) -> f64 {
        match self {
            ContractType::Call => 1.0,
            ContractType::Put => -1.0,
        }
    }

    /// Payoff at expiry for a given spot and strike.
    pub fn intrinsic(&self, spot: f64, strike: f64) -> f64 {
        match self {
            ContractType::Call => (spot - strike).max(0.0),
            ContractType::Put => (strike - spot).max(0.0),
        }
    }
}

/// One leg of one strike for the nearest expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    /// Call or put.
    pub contract_type: ContractType,
    /// Exercise price.
    pub strike: f64,
    /// Last traded premium.
    pub premium: f64,
    /// Outstanding contracts at this strike.
    pub open_interest: u64,
    /// Spot price of the index at fetch time.
    pub underlying: f64,
    /// Expiry date of the contract.
    pub expiry: NaiveDate,
    /// Time to expiry in years.
    pub time_to_expiry: f64,
}

/// Solved implied volatility and sensitivities for one quote.
///
/// `implied_vol` is `None` when the solver did not converge; `delta` and `gamma`
/// are then computed at zero volatility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GreeksResult {
    /// Implied volatility, or `None` as the unsolved sentinel.
    pub implied_vol: Option<f64>,
    /// dV/dS.
    pub delta: f64,
    /// d²V/dS².
    pub gamma: f64,
}

impl GreeksResult {
    /// Result used for every quote when the batch computation faults.
    pub fn zeroed() -> Self {
        Self {
            implied_vol: Some(0.0),
            delta: 0.0,
            gamma: 0.0,
        }
    }
}

/// The persisted unit: a quote, its Greeks and the cycle's ingestion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedQuote {
    /// Source quote.
    pub quote: OptionQuote,
    /// Computed Greeks.
    pub greeks: GreeksResult,
    /// Ingestion timestamp shared by the whole batch.
    pub ingested_at: DateTime<Utc>,
}

impl EnrichedQuote {
    /// Net gamma-exposure proxy: `gamma * OI * multiplier`, signed by contract type.
    pub fn gamma_exposure(&self) -> f64 {
        self.greeks.gamma
            * self.quote.open_interest as f64
            * GEX_CONTRACT_MULTIPLIER
            * self.quote.contract_type.dealer_sign()
    }
}

/// All enriched quotes written by a single cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Shared ingestion timestamp.
    pub ingested_at: DateTime<Utc>,
    /// Shared expiry.
    pub expiry: NaiveDate,
    /// Rows of the snapshot.
    pub quotes: Vec<EnrichedQuote>,
}

impl Snapshot {
    /// Assemble a snapshot, checking the shared timestamp/expiry and the
    /// `(strike, contract type)` uniqueness invariants.
    ///
    /// Returns `Ok(None)` for an empty batch.
    pub fn from_quotes(quotes: Vec<EnrichedQuote>) -> Result<Option<Snapshot>, ChainError> {
        let Some(first) = quotes.first() else {
            return Ok(None);
        };
        let ingested_at = first.ingested_at;
        let expiry = first.quote.expiry;

        let mut seen = HashSet::with_capacity(quotes.len());
        for q in &quotes {
            if q.ingested_at != ingested_at || q.quote.expiry != expiry {
                return Err(ChainError::Parse(format!(
                    "snapshot mixes batches: {} / {} vs {} / {}",
                    q.ingested_at, q.quote.expiry, ingested_at, expiry
                )));
            }
            if !seen.insert((q.quote.strike.to_bits(), q.quote.contract_type)) {
                return Err(ChainError::Parse(format!(
                    "duplicate {} leg at strike {}",
                    q.quote.contract_type, q.quote.strike
                )));
            }
        }

        Ok(Some(Snapshot {
            ingested_at,
            expiry,
            quotes,
        }))
    }

    /// Underlying price recorded with the snapshot.
    pub fn underlying(&self) -> f64 {
        self.quotes.first().map(|q| q.quote.underlying).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn enriched(contract_type: ContractType, strike: f64, ts: DateTime<Utc>) -> EnrichedQuote {
        EnrichedQuote {
            quote: OptionQuote {
                contract_type,
                strike,
                premium: 10.0,
                open_interest: 50,
                underlying: 22000.0,
                expiry: NaiveDate::from_ymd_opt(2024, 12, 26).unwrap(),
                time_to_expiry: 1.0 / 52.0,
            },
            greeks: GreeksResult {
                implied_vol: Some(0.12),
                delta: 0.5,
                gamma: 0.001,
            },
            ingested_at: ts,
        }
    }

    #[test]
    fn contract_type_codes() {
        assert_eq!(ContractType::Call.to_string(), "CE");
        assert_eq!("PE".parse::<ContractType>().unwrap(), ContractType::Put);
        assert_eq!(ContractType::Put.flag(), "p");
    }

    #[test]
    fn gamma_exposure_is_signed_by_contract_type() {
        let ts = Utc.with_ymd_and_hms(2024, 12, 20, 10, 0, 0).unwrap();
        let call = enriched(ContractType::Call, 22000.0, ts);
        let put = enriched(ContractType::Put, 22000.0, ts);
        assert!((call.gamma_exposure() - 5.0).abs() < 1e-9);
        assert!((put.gamma_exposure() + 5.0).abs() < 1e-9);
    }

    #[test]
    fn snapshot_rejects_duplicate_legs() {
        let ts = Utc.with_ymd_and_hms(2024, 12, 20, 10, 0, 0).unwrap();
        let rows = vec![
            enriched(ContractType::Call, 22000.0, ts),
            enriched(ContractType::Call, 22000.0, ts),
        ];
        assert!(Snapshot::from_quotes(rows).is_err());
    }

    #[test]
    fn snapshot_rejects_mixed_timestamps() {
        let ts = Utc.with_ymd_and_hms(2024, 12, 20, 10, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 12, 20, 10, 4, 0).unwrap();
        let rows = vec![
            enriched(ContractType::Call, 22000.0, ts),
            enriched(ContractType::Put, 22000.0, later),
        ];
        assert!(Snapshot::from_quotes(rows).is_err());
    }

    #[test]
    fn enriched_quote_serializes_with_type_code_and_dates() {
        let ts = Utc.with_ymd_and_hms(2024, 12, 20, 10, 0, 0).unwrap();
        let row = enriched(ContractType::Put, 21900.0, ts);
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["quote"]["contract_type"], "PE");
        assert_eq!(json["quote"]["expiry"], "2024-12-26");
        assert_eq!(json["greeks"]["implied_vol"], 0.12);

        let back: EnrichedQuote = serde_json::from_value(json).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn empty_batch_is_no_snapshot() {
        assert!(Snapshot::from_quotes(Vec::new()).unwrap().is_none());
    }
}
