use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::America::New_York;
use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{info, warn};

use crate::models::{RawAnnouncement, SourceId};
use crate::service::events::timing::date_only_instant;
use crate::service::finance::{FinanceService, FinanceServiceError};

pub const EARNINGS_MODULES: [&str; 2] = ["earningsHistory", "calendarEvents"];

/// A fiscal quarter is only matched to an announcement made within this many
/// days of the quarter end.
pub const MAX_REPORT_LAG_DAYS: i64 = 75;

/// One row of `earningsHistory.history[]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct QuarterRow {
    quarter_end: NaiveDate,
    eps_actual: Option<f64>,
    eps_estimate: Option<f64>,
}

/// Fetch the announcement Yahoo currently lists for `ticker`.
pub async fn fetch_earnings(
    finance: &FinanceService,
    ticker: &str,
) -> Result<Vec<RawAnnouncement>, FinanceServiceError> {
    let summary = finance
        .client()
        .get_quote_summary(ticker, &EARNINGS_MODULES)
        .await?;

    parse_earnings_summary(ticker, &summary, Utc::now())
}

/// Turn a `quoteSummary` payload into provider-A announcements.
///
/// `calendarEvents.earnings.earningsDate` gives the announcement instant.
/// Once that instant is at or before `as_of`, the latest `earningsHistory`
/// quarter that ended within [`MAX_REPORT_LAG_DAYS`] before it supplies the
/// reported EPS. Dates Yahoo marks as estimates only carry a calendar day
/// and come back date-only, like Nasdaq rows.
pub fn parse_earnings_summary(
    ticker: &str,
    summary: &Value,
    as_of: DateTime<Utc>,
) -> Result<Vec<RawAnnouncement>, FinanceServiceError> {
    let result = summary
        .get("quoteSummary")
        .and_then(|q| q.get("result"))
        .and_then(|r| r.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| FinanceServiceError::NotFound(ticker.to_string()))?;

    let Some(earnings) = result
        .get("calendarEvents")
        .and_then(|c| c.get("earnings"))
    else {
        return Ok(Vec::new());
    };

    let Some(scheduled) = earnings
        .get("earningsDate")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(value_to_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
    else {
        return Ok(Vec::new());
    };

    let estimated = earnings
        .get("isEarningsDateEstimate")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    // Estimated dates arrive as midnight UTC of the expected day.
    let (announced_at, time_of_day_known) = if estimated {
        (date_only_instant(scheduled.date_naive()), false)
    } else {
        (Some(scheduled), true)
    };

    let reported = if scheduled <= as_of {
        reported_quarter(&quarter_rows(result), scheduled)
    } else {
        None
    };

    let consensus_eps = reported
        .and_then(|q| q.eps_estimate)
        .or_else(|| earnings.get("earningsAverage").and_then(value_to_f64));

    Ok(vec![RawAnnouncement {
        ticker: ticker.trim().to_uppercase(),
        announced_at,
        reported_eps: reported.and_then(|q| q.eps_actual),
        consensus_eps,
        source: SourceId::Yahoo,
        time_of_day_known,
    }])
}

fn quarter_rows(result: &Value) -> Vec<QuarterRow> {
    let Some(history) = result
        .get("earningsHistory")
        .and_then(|h| h.get("history"))
        .and_then(|h| h.as_array())
    else {
        return Vec::new();
    };

    history
        .iter()
        .filter_map(|row| {
            let quarter_end = row
                .get("quarter")
                .and_then(value_to_i64)
                .and_then(|secs| DateTime::from_timestamp(secs, 0))?
                .date_naive();
            Some(QuarterRow {
                quarter_end,
                eps_actual: row.get("epsActual").and_then(value_to_f64),
                eps_estimate: row.get("epsEstimate").and_then(value_to_f64),
            })
        })
        .collect()
}

fn reported_quarter(rows: &[QuarterRow], announced: DateTime<Utc>) -> Option<QuarterRow> {
    let day = announced.with_timezone(&New_York).date_naive();
    rows.iter()
        .filter(|q| q.quarter_end < day && day - q.quarter_end <= Duration::days(MAX_REPORT_LAG_DAYS))
        .max_by_key(|q| q.quarter_end)
        .copied()
}

// quoteSummary values come either bare or as {"raw": .., "fmt": ..}.
fn value_to_f64(value: &Value) -> Option<f64> {
    value
        .get("raw")
        .and_then(|r| r.as_f64())
        .or_else(|| value.as_f64())
        .filter(|v| v.is_finite())
}

fn value_to_i64(value: &Value) -> Option<i64> {
    value
        .get("raw")
        .and_then(|r| r.as_i64())
        .or_else(|| value.as_i64())
}

/// Fetch many tickers with at most `max_workers` lookups in flight; a failing
/// ticker is logged and skipped.
pub async fn fetch_many(
    finance: &FinanceService,
    tickers: &[String],
    max_workers: usize,
) -> Vec<RawAnnouncement> {
    let results: Vec<(String, Result<Vec<RawAnnouncement>, FinanceServiceError>)> =
        stream::iter(tickers.iter().cloned())
            .map(|ticker| async move {
                let res = fetch_earnings(finance, &ticker).await;
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
        "Fetched {} Yahoo rows for {} tickers ({} failed)",
        records.len(),
        tickers.len(),
        failed
    );
    records
}
