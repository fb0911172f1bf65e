//! Remote source constants shared by the session and fetch stages.

use std::time::Duration;

/// Landing page visited first to obtain session cookies.
pub const LANDING_URL: &str = "https://www.nseindia.com";
/// Option-chain endpoint for indices; the symbol is appended as a query parameter.
pub const CHAIN_URL: &str = "https://www.nseindia.com/api/option-chain-indices";
/// Index symbol used when none is supplied.
pub const DEFAULT_SYMBOL: &str = "NIFTY";

/// Timeout applied to every outbound request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Pause between cookie acquisition and the first authenticated call.
pub const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Browser-like header set sent with every request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
/// `Accept` header value.
pub const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";
/// `Accept-Language` header value.
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
/// `Referer` header value.
pub const REFERER: &str = "https://www.nseindia.com/option-chain";

/// Build the chain URL for `symbol`, e.g. `...option-chain-indices?symbol=NIFTY`.
pub fn chain_url(symbol: &str) -> String {
    format!("{}?symbol={}", CHAIN_URL, symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_url_carries_symbol() {
        assert_eq!(
            chain_url("BANKNIFTY"),
            "https://www.nseindia.com/api/option-chain-indices?symbol=BANKNIFTY"
        );
    }
}
