//! Option-chain fetch and payload parsing.
//!
//! `ChainFetcher::fetch` classifies the HTTP outcome (401 is `Blocked`, any
//! other non-2xx is `Http`, transport timeouts are `Timeout`). `parse_chain`
//! keeps only strikes of the nearest expiry and emits one `OptionQuote` per
//! present call/put leg.

use std::collections::HashSet;

use chain_common::source::chain_url;
use chain_common::{ChainError, ContractType, OptionQuote, Result};
use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::source::session::Session;

/// Weekly-expiry approximation used for every contract, in years.
pub const WEEKLY_TIME_TO_EXPIRY: f64 = 1.0 / 52.0;

/// Format of the source's expiry identifiers, e.g. `26-Dec-2024`.
const EXPIRY_FORMAT: &str = "%d-%b-%Y";

/// Undecoded response body of the chain endpoint.
#[derive(Debug, Clone)]
pub struct RawPayload {
    /// Body text as received.
    pub body: String,
}

impl RawPayload {
    /// Wrap a body string.
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

#[derive(Debug, Deserialize)]
struct ChainResponse {
    records: Records,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Records {
    #[serde(default)]
    data: Vec<StrikeRecord>,
    expiry_dates: Vec<String>,
    underlying_value: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StrikeRecord {
    strike_price: Option<f64>,
    expiry_date: Option<String>,
    #[serde(rename = "CE")]
    call: Option<Leg>,
    #[serde(rename = "PE")]
    put: Option<Leg>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Leg {
    #[serde(default, deserialize_with = "lenient_number")]
    last_price: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    open_interest: f64,
}

/// Numbers or numeric strings; `null` and anything else read as 0 so one bad
/// leg cannot sink the whole payload.
fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    };
    Ok(number.filter(|n| n.is_finite()).unwrap_or(0.0))
}

/// Fetches the raw chain for one index symbol.
pub struct ChainFetcher {
    url: String,
}

impl ChainFetcher {
    /// Fetcher for `symbol`, e.g. `NIFTY`.
    pub fn new(symbol: &str) -> Self {
        Self {
            url: chain_url(symbol),
        }
    }

    /// Fetcher for an explicit chain URL.
    #[cfg(test)]
    pub(crate) fn with_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }

    /// Issue the authenticated GET within `session`.
    pub fn fetch(&self, session: &Session) -> Result<RawPayload> {
        let response = session.client().get(&self.url).send().map_err(transport_error)?;
        let status = response.status().as_u16();
        info!("Status Code: {}", status);
        check_status(status)?;

        let body = response.text().map_err(transport_error)?;
        Ok(RawPayload::new(body))
    }
}

/// Map an HTTP status to the fetch taxonomy.
pub fn check_status(status: u16) -> Result<()> {
    match status {
        200..=299 => Ok(()),
        401 => Err(ChainError::Blocked),
        other => Err(ChainError::Http(other)),
    }
}

fn transport_error(e: reqwest::Error) -> ChainError {
    if e.is_timeout() {
        ChainError::Timeout(e.to_string())
    } else if let Some(status) = e.status() {
        ChainError::Http(status.as_u16())
    } else {
        ChainError::Connection(e.to_string())
    }
}

/// Extract quotes for the nearest expiry.
///
/// Strikes of other expiries are ignored; records with neither leg, or with no
/// strike/expiry, are skipped. A repeated `(strike, type)` keeps its first leg.
pub fn parse_chain(payload: &RawPayload, time_to_expiry: f64) -> Result<Vec<OptionQuote>> {
    let response: ChainResponse = serde_json::from_str(&payload.body)?;
    let records = response.records;

    let current = records
        .expiry_dates
        .first()
        .ok_or_else(|| ChainError::Parse("expiry list is empty".into()))?;
    let expiry = NaiveDate::parse_from_str(current, EXPIRY_FORMAT)
        .map_err(|e| ChainError::Parse(format!("unparsable expiry {:?}: {}", current, e)))?;
    let underlying = records.underlying_value;

    info!("Processing chain (Price: {}) for Expiry: {}", underlying, current);

    let mut seen = HashSet::new();
    let mut quotes = Vec::new();
    for record in &records.data {
        if record.expiry_date.as_deref() != Some(current.as_str()) {
            continue;
        }
        let Some(strike) = record.strike_price else {
            continue;
        };

        let legs = [
            (ContractType::Call, record.call.as_ref()),
            (ContractType::Put, record.put.as_ref()),
        ];
        for (contract_type, leg) in legs {
            let Some(leg) = leg else {
                continue;
            };
            if !seen.insert((strike.to_bits(), contract_type)) {
                warn!("Duplicate {} leg at strike {} skipped", contract_type, strike);
                continue;
            }
            quotes.push(OptionQuote {
                contract_type,
                strike,
                premium: leg.last_price,
                open_interest: contracts(leg.open_interest),
                underlying,
                expiry,
                time_to_expiry,
            });
        }
    }
    Ok(quotes)
}

fn contracts(raw: f64) -> u64 {
    if raw.is_finite() && raw > 0.0 {
        raw.round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::engine::GreeksEngine;
    use crate::source::session::SessionManager;
    use chrono::Utc;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    const OK_EMPTY: &str = "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
    const UNAUTHORIZED: &str =
        "HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
    const UNAVAILABLE: &str =
        "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

    /// Serve one connection per entry; `None` reads the request and never answers.
    fn serve(replies: Vec<Option<&'static str>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for reply in replies {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                match reply {
                    Some(response) => {
                        let _ = stream.write_all(response.as_bytes());
                    }
                    None => thread::sleep(Duration::from_secs(3)),
                }
            }
        });
        format!("http://{}", addr)
    }

    fn fetch_from(base: &str, timeout: Duration) -> Result<RawPayload> {
        let session = SessionManager::for_landing(base, timeout).acquire()?;
        ChainFetcher::with_url(&format!("{}/api/option-chain-indices?symbol=NIFTY", base))
            .fetch(&session)
    }

    const PAYLOAD: &str = r#"{
        "records": {
            "expiryDates": ["26-Dec-2024", "02-Jan-2025"],
            "underlyingValue": 22010.5,
            "data": [
                {"strikePrice": 21950, "expiryDate": "26-Dec-2024",
                 "CE": {"lastPrice": 180.25, "openInterest": 12000, "changeinOpenInterest": 5},
                 "PE": {"lastPrice": 95.1, "openInterest": 15500}},
                {"strikePrice": 22000, "expiryDate": "26-Dec-2024",
                 "CE": {"lastPrice": 150.0, "openInterest": 30000}},
                {"strikePrice": 22050, "expiryDate": "26-Dec-2024"},
                {"strikePrice": 22000, "expiryDate": "02-Jan-2025",
                 "CE": {"lastPrice": 260.0, "openInterest": 800},
                 "PE": {"lastPrice": 210.0, "openInterest": 900}},
                {"strikePrice": 22100, "expiryDate": "26-Dec-2024",
                 "PE": {"openInterest": 4100.0}}
            ]
        }
    }"#;

    fn parse(body: &str) -> Result<Vec<OptionQuote>> {
        parse_chain(&RawPayload::new(body), WEEKLY_TIME_TO_EXPIRY)
    }

    #[test]
    fn emits_one_quote_per_present_leg_of_nearest_expiry() {
        let quotes = parse(PAYLOAD).unwrap();
        let legs: Vec<(ContractType, f64)> =
            quotes.iter().map(|q| (q.contract_type, q.strike)).collect();
        assert_eq!(
            legs,
            vec![
                (ContractType::Call, 21950.0),
                (ContractType::Put, 21950.0),
                (ContractType::Call, 22000.0),
                (ContractType::Put, 22100.0),
            ]
        );

        let expiry = NaiveDate::from_ymd_opt(2024, 12, 26).unwrap();
        assert!(quotes.iter().all(|q| q.expiry == expiry));
        assert!(quotes.iter().all(|q| q.underlying == 22010.5));
        assert!(quotes.iter().all(|q| q.time_to_expiry == WEEKLY_TIME_TO_EXPIRY));
    }

    #[test]
    fn missing_leg_fields_default_to_zero() {
        let quotes = parse(PAYLOAD).unwrap();
        let put = quotes.last().unwrap();
        assert_eq!(put.premium, 0.0);
        assert_eq!(put.open_interest, 4100);
        assert_eq!(quotes[0].premium, 180.25);
        assert_eq!(quotes[0].open_interest, 12000);
    }

    #[test]
    fn empty_expiry_list_is_parse_error() {
        let body = r#"{"records": {"expiryDates": [], "underlyingValue": 1.0, "data": []}}"#;
        assert!(matches!(parse(body), Err(ChainError::Parse(_))));
    }

    #[test]
    fn unexpected_shape_is_parse_error() {
        let err = parse(r#"{"filtered": {}}"#).unwrap_err();
        assert!(err.is_parse());
        assert!(parse("<html>Access Denied</html>").unwrap_err().is_parse());
    }

    #[test]
    fn null_premium_leg_keeps_its_neighbour() {
        let body = r#"{"records": {"expiryDates": ["26-Dec-2024"], "underlyingValue": 22000,
            "data": [
                {"strikePrice": 22000, "expiryDate": "26-Dec-2024",
                 "CE": {"lastPrice": 150, "openInterest": 52000},
                 "PE": {"lastPrice": null, "openInterest": "61,000"}},
                {"strikePrice": 22050, "expiryDate": "26-Dec-2024",
                 "CE": {"lastPrice": "-", "openInterest": null}}
            ]}}"#;
        let quotes = parse(body).unwrap();
        assert_eq!(quotes.len(), 3);
        assert_eq!(quotes[0].premium, 150.0);
        assert_eq!(quotes[0].open_interest, 52000);
        assert_eq!(quotes[1].contract_type, ContractType::Put);
        assert_eq!(quotes[1].premium, 0.0);
        assert_eq!(quotes[1].open_interest, 61000);
        assert_eq!(quotes[2].premium, 0.0);
        assert_eq!(quotes[2].open_interest, 0);

        let enriched = GreeksEngine::default().compute(quotes, Utc::now());
        assert!(enriched[0].greeks.implied_vol.is_some());
        assert_eq!(enriched[1].greeks.implied_vol, None);
        assert_eq!(enriched[2].greeks.implied_vol, None);
    }

    #[test]
    fn duplicate_legs_keep_first() {
        let body = r#"{"records": {"expiryDates": ["26-Dec-2024"], "underlyingValue": 22000,
            "data": [
                {"strikePrice": 22000, "expiryDate": "26-Dec-2024", "CE": {"lastPrice": 150}},
                {"strikePrice": 22000, "expiryDate": "26-Dec-2024", "CE": {"lastPrice": 151}}
            ]}}"#;
        let quotes = parse(body).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].premium, 150.0);
    }

    #[test]
    fn unauthorized_response_is_blocked() {
        let base = serve(vec![Some(OK_EMPTY), Some(UNAUTHORIZED)]);
        let result = fetch_from(&base, Duration::from_secs(5));
        assert!(matches!(result, Err(ChainError::Blocked)));
    }

    #[test]
    fn server_error_is_http_error() {
        let base = serve(vec![Some(OK_EMPTY), Some(UNAVAILABLE)]);
        let result = fetch_from(&base, Duration::from_secs(5));
        assert!(matches!(result, Err(ChainError::Http(503))));
    }

    #[test]
    fn success_returns_body() {
        let reply = "HTTP/1.1 200 OK\r\nContent-Length: 13\r\nConnection: close\r\n\r\n{\"records\":1}";
        let base = serve(vec![Some(OK_EMPTY), Some(reply)]);
        let payload = fetch_from(&base, Duration::from_secs(5)).unwrap();
        assert_eq!(payload.body, "{\"records\":1}");
    }

    #[test]
    fn silent_server_is_timeout() {
        let base = serve(vec![Some(OK_EMPTY), None]);
        let result = fetch_from(&base, Duration::from_millis(500));
        assert!(matches!(result, Err(ChainError::Timeout(_))));
    }

    #[test]
    fn refused_chain_request_is_connection_error() {
        let base = serve(vec![Some(OK_EMPTY)]);
        let session = SessionManager::for_landing(&base, Duration::from_secs(5))
            .acquire()
            .unwrap();
        let result = ChainFetcher::with_url("http://127.0.0.1:9/api").fetch(&session);
        assert!(matches!(result, Err(ChainError::Connection(_))));
    }

    #[test]
    fn status_classification() {
        assert!(check_status(200).is_ok());
        assert!(matches!(check_status(401), Err(ChainError::Blocked)));
        assert!(matches!(check_status(403), Err(ChainError::Http(403))));
        assert!(matches!(check_status(503), Err(ChainError::Http(503))));
    }
}
