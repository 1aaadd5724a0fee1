use std::collections::HashMap;

use redis::AsyncCommands;

use crate::models::TickerMetadata;
use crate::service::caching::{CacheError, RedisCache};

const TICKER_SET_KEY: &str = "tickers";

fn ticker_key(ticker: &str) -> String {
    format!("ticker:{ticker}")
}

/// Register tickers (upper-cased). Existing entries are left untouched.
pub async fn insert_missing(cache: &RedisCache, symbols: &[String]) -> Result<usize, CacheError> {
    if symbols.is_empty() {
        return Ok(0);
    }
    let mut conn = cache.connection();
    let upper: Vec<String> = symbols.iter().map(|s| s.trim().to_uppercase()).collect();
    let added: usize = conn.sadd(TICKER_SET_KEY, upper).await?;
    Ok(added)
}

pub async fn load(cache: &RedisCache, ticker: &str) -> Result<TickerMetadata, CacheError> {
    let mut conn = cache.connection();
    let mut fields: HashMap<String, String> = conn.hgetall(ticker_key(ticker)).await?;
    Ok(TickerMetadata {
        ticker: ticker.to_string(),
        name: fields.remove("name"),
        sector: fields.remove("sector"),
        industry: fields.remove("industry"),
    })
}

/// Registered tickers still missing a name, sector or industry, sorted.
pub async fn needing_enrichment(cache: &RedisCache, limit: usize) -> Result<Vec<String>, CacheError> {
    let mut conn = cache.connection();
    let mut all: Vec<String> = conn.smembers(TICKER_SET_KEY).await?;
    all.sort();

    let mut out = Vec::new();
    for ticker in all {
        if out.len() >= limit {
            break;
        }
        if !load(cache, &ticker).await?.is_complete() {
            out.push(ticker);
        }
    }
    Ok(out)
}

/// Only the fields that are present; absent values never clobber stored ones.
pub fn coalesce_fields(meta: &TickerMetadata) -> Vec<(&'static str, String)> {
    [
        ("name", &meta.name),
        ("sector", &meta.sector),
        ("industry", &meta.industry),
    ]
    .into_iter()
    .filter_map(|(field, value)| value.clone().map(|v| (field, v)))
    .collect()
}

pub async fn upsert_metadata(cache: &RedisCache, items: &[TickerMetadata]) -> Result<(), CacheError> {
    if items.is_empty() {
        return Ok(());
    }

    let mut conn = cache.connection();
    let mut pipe = redis::pipe();
    for meta in items {
        pipe.sadd(TICKER_SET_KEY, &meta.ticker).ignore();
        let fields = coalesce_fields(meta);
        if !fields.is_empty() {
            pipe.hset_multiple(ticker_key(&meta.ticker), &fields).ignore();
        }
    }
    pipe.query_async::<()>(&mut conn).await?;
    Ok(())
}
