use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::NaiveDate;
use finance_query_core::{FetchClient, YahooAuthManager, YahooError, YahooFinanceClient};
use serde_json::Value;

use crate::models::{RawAnnouncement, TickerMetadata};

pub mod nasdaq;
pub mod prices;
pub mod snapshots;
pub mod tickers;
pub mod yahoo;

#[derive(Debug, thiserror::Error)]
pub enum FinanceServiceError {
    #[error(transparent)]
    Yahoo(#[from] YahooError),
    #[error("No data for symbol {0}")]
    NotFound(String),
    #[error("Provider API error: {0}")]
    Http(String),
}

pub struct FinanceService {
    client: Arc<YahooFinanceClient>,
    #[allow(dead_code)]
    auth: Arc<YahooAuthManager>,
    #[allow(dead_code)]
    fetch: Arc<FetchClient>,
    http: reqwest::Client,
}

impl FinanceService {
    /// Build a finance service with optional proxy support for Yahoo and a
    /// plain HTTP client (with timeout) for the Nasdaq feed.
    pub fn new(proxy: Option<String>, timeout: StdDuration) -> Result<Self, FinanceServiceError> {
        let fetch = Arc::new(FetchClient::new(proxy.clone())?);
        let auth = Arc::new(YahooAuthManager::new(proxy, fetch.cookie_jar().clone()));
        let client = Arc::new(YahooFinanceClient::new(auth.clone(), fetch.clone()));
        let http = nasdaq::build_client(timeout)?;

        Ok(Self {
            client,
            auth,
            fetch,
            http,
        })
    }

    /// Access the underlying YahooFinanceClient.
    pub fn client(&self) -> &YahooFinanceClient {
        self.client.as_ref()
    }

    /// Fetch name / sector / industry for a symbol.
    pub async fn get_ticker_metadata(
        &self,
        symbol: &str,
    ) -> Result<TickerMetadata, FinanceServiceError> {
        let summary = self
            .client
            .get_quote_summary(symbol, &["price", "assetProfile"])
            .await?;

        let result = summary
            .get("quoteSummary")
            .and_then(|q| q.get("result"))
            .and_then(|r| r.as_array())
            .and_then(|arr| arr.first())
            .ok_or_else(|| FinanceServiceError::NotFound(symbol.to_string()))?;

        Ok(metadata_from_summary(symbol, result))
    }

    /// Fetch Nasdaq earnings-surprise rows for many tickers, `max_workers` at a time.
    pub async fn get_nasdaq_announcements(
        &self,
        tickers: &[String],
        max_workers: usize,
    ) -> Vec<RawAnnouncement> {
        nasdaq::fetch_many(&self.http, tickers, max_workers).await
    }

    /// Fetch the Yahoo earnings calendar entry for many tickers.
    pub async fn get_yahoo_announcements(
        &self,
        tickers: &[String],
        max_workers: usize,
    ) -> Vec<RawAnnouncement> {
        yahoo::fetch_many(self, tickers, max_workers).await
    }
}

/// Pull metadata fields out of one `quoteSummary.result[]` entry.
pub fn metadata_from_summary(symbol: &str, result: &Value) -> TickerMetadata {
    let name = extract_str(result, &["price", "longName"])
        .or_else(|| extract_str(result, &["price", "shortName"]));

    TickerMetadata {
        ticker: symbol.to_uppercase(),
        name,
        sector: extract_str(result, &["assetProfile", "sector"]),
        industry: extract_str(result, &["assetProfile", "industry"]),
    }
}

fn extract_str(root: &Value, path: &[&str]) -> Option<String> {
    let mut current = root;
    for key in path {
        current = current.get(*key)?;
    }

    current
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Lenient numeric coercion for provider cells such as `"$1,234.56"`,
/// `"-0.12"` or `"N/A"`. Non-finite values are treated as missing.
pub(crate) fn parse_decimal(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Calendar dates as providers write them: `MM/DD/YYYY` or `YYYY-MM-DD`.
pub(crate) fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}
