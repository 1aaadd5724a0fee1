use std::collections::BTreeMap;

use chrono::NaiveDate;
use redis::AsyncCommands;
use tracing::warn;

use crate::models::{ReturnPanel, ReturnSeries};
use crate::service::caching::{CacheError, RedisCache};

fn returns_key(ticker: &str) -> String {
    format!("prices:ret:{}", ticker.to_uppercase())
}

/// Replace the stored return series of every ticker in `panel`.
pub async fn save_returns(cache: &RedisCache, panel: &ReturnPanel) -> Result<usize, CacheError> {
    let mut conn = cache.connection();
    let mut written = 0usize;

    for ticker in panel.tickers() {
        let Some(series) = panel.get(ticker) else {
            continue;
        };
        let key = returns_key(ticker);
        let fields: Vec<(String, f64)> = series
            .iter()
            .map(|(date, ret)| (date.format("%Y-%m-%d").to_string(), ret))
            .collect();

        let mut pipe = redis::pipe();
        pipe.atomic().del(&key).ignore();
        if !fields.is_empty() {
            pipe.hset_multiple(&key, &fields).ignore();
        }
        pipe.query_async::<()>(&mut conn).await?;
        written += fields.len();
    }

    Ok(written)
}

/// Load stored returns for the given tickers. Tickers with nothing stored are
/// left out of the panel.
pub async fn load_returns(cache: &RedisCache, tickers: &[String]) -> Result<ReturnPanel, CacheError> {
    let mut conn = cache.connection();
    let mut panel = ReturnPanel::new();

    for ticker in tickers {
        let stored: BTreeMap<String, f64> = conn.hgetall(returns_key(ticker)).await?;
        if stored.is_empty() {
            continue;
        }

        let mut series = ReturnSeries::new(ticker.to_uppercase());
        for (raw_date, ret) in stored {
            match NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d") {
                Ok(date) => series.insert(date, ret),
                Err(_) => warn!("ignoring stored return with bad date {raw_date} for {ticker}"),
            }
        }
        panel.insert(series);
    }

    Ok(panel)
}
