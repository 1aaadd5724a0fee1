use std::time::Duration as StdDuration;

use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::models::{RawAnnouncement, SourceId};
use crate::service::events::timing::date_only_instant;
use crate::service::finance::{parse_calendar_date, parse_decimal, FinanceServiceError};

const NASDAQ_SURPRISE_URL: &str = "https://api.nasdaq.com/api/company";
const NASDAQ_USER_AGENT: &str = "Mozilla/5.0";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    data: Option<ApiData>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    #[serde(rename = "earningsSurpriseTable")]
    earnings_surprise_table: Option<ApiTable>,
}

#[derive(Debug, Deserialize)]
struct ApiTable {
    #[serde(default)]
    rows: Vec<ApiRow>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct ApiRow {
    #[serde(rename = "fiscalQtrEnding")]
    fiscal_quarter_ending: Option<String>,
    #[serde(rename = "dateReported")]
    date_reported: Option<String>,
    eps: Option<Value>,
    #[serde(rename = "consensusForecast")]
    consensus_forecast: Option<Value>,
}

pub(crate) fn build_client(timeout: StdDuration) -> Result<reqwest::Client, FinanceServiceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(NASDAQ_USER_AGENT)
        .build()
        .map_err(|e| FinanceServiceError::Http(format!("failed to build client: {e}")))
}

/// Fetch the earnings-surprise table for one ticker.
pub async fn fetch_surprises(
    client: &reqwest::Client,
    ticker: &str,
) -> Result<Vec<RawAnnouncement>, FinanceServiceError> {
    let url = format!("{NASDAQ_SURPRISE_URL}/{ticker}/earnings-surprise");

    let resp = client.get(&url).send().await.map_err(|e| {
        warn!("Nasdaq request for {} failed: {}", ticker, e);
        FinanceServiceError::Http(format!("nasdaq request failed: {e}"))
    })?;

    if !resp.status().is_success() {
        let status = resp.status();
        return Err(FinanceServiceError::Http(format!(
            "nasdaq api status {status} for {ticker}"
        )));
    }

    let raw_bytes = resp
        .bytes()
        .await
        .map_err(|e| FinanceServiceError::Http(format!("nasdaq body read failed: {e}")))?;

    parse_surprise_payload(ticker, &raw_bytes)
}

/// Turn a raw Nasdaq payload into provider-B announcements.
///
/// The feed only carries a report date, so instants are anchored at noon ET
/// and flagged as having no known time of day.
pub fn parse_surprise_payload(
    ticker: &str,
    body: &[u8],
) -> Result<Vec<RawAnnouncement>, FinanceServiceError> {
    let parsed: ApiResponse = serde_json::from_slice(body).map_err(|e| {
        let preview = String::from_utf8_lossy(&body[..body.len().min(300)]);
        warn!("Failed to parse Nasdaq response for {}: {}; body preview: {}", ticker, e, preview);
        FinanceServiceError::Http(format!("nasdaq parse failed: {e}"))
    })?;

    let rows = parsed
        .data
        .and_then(|d| d.earnings_surprise_table)
        .map(|t| t.rows)
        .unwrap_or_default();

    let ticker = ticker.trim().to_uppercase();
    Ok(rows
        .into_iter()
        .map(|row| RawAnnouncement {
            ticker: ticker.clone(),
            announced_at: row
                .date_reported
                .as_deref()
                .and_then(parse_calendar_date)
                .and_then(date_only_instant),
            reported_eps: row.eps.as_ref().and_then(value_to_f64),
            consensus_eps: row.consensus_forecast.as_ref().and_then(value_to_f64),
            source: SourceId::Nasdaq,
            time_of_day_known: false,
        })
        .collect())
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

/// Fetch many tickers with at most `max_workers` requests in flight.
///
/// A failing ticker is logged and skipped; output is sorted by ticker then
/// instant so downstream tie-breaks do not depend on completion order.
pub async fn fetch_many(
    client: &reqwest::Client,
    tickers: &[String],
    max_workers: usize,
) -> Vec<RawAnnouncement> {
    let results: Vec<(String, Result<Vec<RawAnnouncement>, FinanceServiceError>)> =
        stream::iter(tickers.iter().cloned())
            .map(|ticker| async move {
                let res = fetch_surprises(client, &ticker).await;
                (ticker, res)
            })
            .buffer_unordered(max_workers.max(1))
            .collect()
            .await;

    let mut records = Vec::new();
    let mut failed = 0usize;
    for (ticker, res) in results {
        match res {
            Ok(mut rows) => records.append(&mut rows),
            Err(err) => {
                failed += 1;
                warn!("Failed {}: {}", ticker, err);
            }
        }
    }

    records.sort_by(|a, b| {
        a.ticker
            .cmp(&b.ticker)
            .then_with(|| a.announced_at.cmp(&b.announced_at))
    });

    info!(
        "Fetched {} Nasdaq rows for {} tickers ({} failed)",
        records.len(),
        tickers.len(),
        failed
    );
    records
}
