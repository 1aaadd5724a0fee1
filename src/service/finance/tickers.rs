use std::collections::HashMap;
use std::time::Duration as StdDuration;

use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::models::TickerMetadata;
use crate::service::caching::collections::tickers as ticker_store;
use crate::service::caching::{CacheError, RedisCache};
use crate::service::finance::FinanceService;

const ENRICHMENT_SCAN_LIMIT: usize = 100_000;

/// Batching knobs for metadata enrichment.
#[derive(Debug, Clone, Copy)]
pub struct EnrichmentSettings {
    pub batch_size: usize,
    pub max_workers: usize,
    pub pause: StdDuration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub registered: usize,
    pub needing: usize,
    pub enriched: usize,
}

/// Fetch metadata for `symbols` with at most `max_workers` requests in flight.
/// A failed lookup yields an all-empty record rather than an error.
pub async fn fetch_metadata(
    finance: &FinanceService,
    symbols: &[String],
    max_workers: usize,
) -> HashMap<String, TickerMetadata> {
    stream::iter(symbols.iter().cloned())
        .map(|sym| async move {
            let meta = match finance.get_ticker_metadata(&sym).await {
                Ok(meta) => meta,
                Err(err) => {
                    warn!("metadata lookup for {} failed: {}", sym, err);
                    TickerMetadata::empty(sym.clone())
                }
            };
            (sym, meta)
        })
        .buffer_unordered(max_workers.max(1))
        .collect()
        .await
}

/// Register `symbols`, then fill in missing name/sector/industry in batches.
pub async fn load_and_enrich(
    finance: &FinanceService,
    cache: &RedisCache,
    symbols: &[String],
    settings: EnrichmentSettings,
) -> Result<EnrichmentReport, CacheError> {
    let symbols: Vec<String> = symbols.iter().map(|s| s.trim().to_uppercase()).collect();
    let registered = ticker_store::insert_missing(cache, &symbols).await?;

    let to_fill = ticker_store::needing_enrichment(cache, ENRICHMENT_SCAN_LIMIT).await?;
    if to_fill.is_empty() {
        info!("Nothing to enrich; all rows are complete.");
        return Ok(EnrichmentReport {
            registered,
            ..Default::default()
        });
    }

    let total = to_fill.len();
    info!("{} ticker(s) need enrichment.", total);

    let mut done = 0usize;
    for batch in to_fill.chunks(settings.batch_size.max(1)) {
        let mut meta = fetch_metadata(finance, batch, settings.max_workers).await;
        let rows: Vec<TickerMetadata> = batch
            .iter()
            .map(|sym| {
                let mut row = meta.remove(sym).unwrap_or_else(|| TickerMetadata::empty(sym.clone()));
                row.ticker = sym.clone();
                row
            })
            .collect();

        ticker_store::upsert_metadata(cache, &rows).await?;
        done += batch.len();
        info!("Enriched {}/{}", done, total);

        if !settings.pause.is_zero() {
            tokio::time::sleep(settings.pause).await;
        }
    }

    Ok(EnrichmentReport {
        registered,
        needing: total,
        enriched: done,
    })
}
