//! Cookie bootstrap against the source's landing page.
//!
//! The chain endpoint rejects requests that do not carry the cookies set by a
//! prior visit to the landing page. `SessionManager::acquire` performs that
//! visit with a browser-like header set, waits a fixed settle delay and hands
//! back a `Session` whose client replays the cookies. There is no retry here;
//! a failed bootstrap aborts the cycle.

use std::thread;
use std::time::Duration;

use chain_common::source::{self, LANDING_URL, REQUEST_TIMEOUT, SETTLE_DELAY};
use chain_common::{ChainError, Result};
use log::{error, info};
use reqwest::blocking::Client;
use reqwest::header::{self, HeaderMap, HeaderValue};

/// HTTP client carrying the cookies acquired for one cycle.
pub struct Session {
    client: Client,
}

impl Session {
    /// Cookie-bearing client for authenticated calls.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Builds fresh sessions.
pub struct SessionManager {
    landing_url: String,
    timeout: Duration,
    settle_delay: Duration,
}

impl SessionManager {
    /// Manager for the default landing page, 10 s timeout and 2 s settle delay.
    pub fn new() -> Self {
        Self {
            landing_url: LANDING_URL.to_string(),
            timeout: REQUEST_TIMEOUT,
            settle_delay: SETTLE_DELAY,
        }
    }

    /// Manager for a custom landing page with no settle delay.
    #[cfg(test)]
    pub(crate) fn for_landing(landing_url: &str, timeout: Duration) -> Self {
        Self {
            landing_url: landing_url.to_string(),
            timeout,
            settle_delay: Duration::ZERO,
        }
    }

    /// Visit the landing page and return a session holding its cookies.
    pub fn acquire(&self) -> Result<Session> {
        let client = build_client(self.timeout)?;

        info!("Connecting to {} for session cookies...", self.landing_url);
        client.get(&self.landing_url).send().map_err(|e| {
            error!("Error connecting to landing page: {}", e);
            ChainError::Connection(e.to_string())
        })?;

        thread::sleep(self.settle_delay);
        Ok(Session { client })
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Header set sent with every request.
pub fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, HeaderValue::from_static(source::USER_AGENT));
    headers.insert(header::ACCEPT, HeaderValue::from_static(source::ACCEPT));
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static(source::ACCEPT_LANGUAGE));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::REFERER, HeaderValue::from_static(source::REFERER));
    headers
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .default_headers(browser_headers())
        .cookie_store(true)
        .timeout(timeout)
        .build()
        .map_err(|e| ChainError::Connection(format!("failed to build HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_look_like_a_browser() {
        let headers = browser_headers();
        assert!(headers[header::USER_AGENT].to_str().unwrap().starts_with("Mozilla/5.0"));
        assert_eq!(headers[header::REFERER], "https://www.nseindia.com/option-chain");
        assert_eq!(headers.len(), 5);
    }

    #[test]
    fn unreachable_landing_page_is_connection_error() {
        let manager = SessionManager::for_landing("http://127.0.0.1:9/", Duration::from_secs(1));
        assert!(matches!(manager.acquire(), Err(ChainError::Connection(_))));
    }
}
