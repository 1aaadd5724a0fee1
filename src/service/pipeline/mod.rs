use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::models::{CanonicalEvent, SourceId};
use crate::service::caching::collections::{events as event_store, outcomes as outcome_store, prices as price_store};
use crate::service::caching::{CacheError, RedisCache};
use crate::service::events::{reconcile, Reconciliation};
use crate::service::finance::prices::{self, PriceFileError};
use crate::service::finance::snapshots::{self, SnapshotError};
use crate::service::finance::tickers::{self, EnrichmentSettings};
use crate::service::finance::FinanceService;
use crate::service::outcomes::{self, OutcomeBatch, OutcomeError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Prices(#[from] PriceFileError),
    #[error(transparent)]
    Outcome(#[from] OutcomeError),
    #[error("stage {0:?} needs a finance client but none was attached")]
    FinanceNotConfigured(Stage),
    #[error("unknown stage {0:?} (expected fetch-yahoo, fetch-nasdaq, prices, tickers, events, outcomes or all)")]
    UnknownStage(String),
}

/// One step of the pipeline, selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchYahoo,
    FetchNasdaq,
    Prices,
    Tickers,
    Events,
    Outcomes,
    All,
}

impl FromStr for Stage {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fetch-yahoo" | "yahoo" => Ok(Stage::FetchYahoo),
            "fetch-nasdaq" | "nasdaq" => Ok(Stage::FetchNasdaq),
            "prices" => Ok(Stage::Prices),
            "tickers" => Ok(Stage::Tickers),
            "events" | "merge" => Ok(Stage::Events),
            "outcomes" => Ok(Stage::Outcomes),
            "all" => Ok(Stage::All),
            other => Err(PipelineError::UnknownStage(other.to_string())),
        }
    }
}

impl Stage {
    /// Stages that call out to Yahoo or Nasdaq.
    pub fn requires_finance(self) -> bool {
        matches!(self, Stage::FetchYahoo | Stage::FetchNasdaq | Stage::Tickers)
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    cache: RedisCache,
    finance: Option<Arc<FinanceService>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, cache: RedisCache) -> Self {
        Self {
            config,
            cache,
            finance: None,
        }
    }

    /// Attach the network client needed by the fetch stages and `tickers`.
    pub fn with_finance(mut self, finance: Arc<FinanceService>) -> Self {
        self.finance = Some(finance);
        self
    }

    pub async fn run(&self, stage: Stage) -> Result<(), PipelineError> {
        if stage.requires_finance() && self.finance.is_none() {
            return Err(PipelineError::FinanceNotConfigured(stage));
        }

        match stage {
            Stage::FetchYahoo => self.fetch_yahoo().await.map(|_| ()),
            Stage::FetchNasdaq => self.fetch_nasdaq().await.map(|_| ()),
            Stage::Prices => self.ingest_prices().await.map(|_| ()),
            Stage::Tickers => self.enrich_tickers().await,
            Stage::Events => self.merge_events().await.map(|_| ()),
            Stage::Outcomes => self.compute_outcomes().await.map(|_| ()),
            Stage::All => {
                self.ingest_prices().await?;
                self.merge_events().await?;
                self.compute_outcomes().await?;
                Ok(())
            }
        }
    }

    fn finance(&self, stage: Stage) -> Result<&FinanceService, PipelineError> {
        self.finance
            .as_deref()
            .ok_or(PipelineError::FinanceNotConfigured(stage))
    }

    /// Fetch Yahoo's earnings calendar for the configured tickers and persist
    /// it as the provider-A snapshot.
    pub async fn fetch_yahoo(&self) -> Result<usize, PipelineError> {
        let finance = self.finance(Stage::FetchYahoo)?;
        let records = finance
            .get_yahoo_announcements(&self.config.tickers, self.config.max_workers)
            .await;

        let path = self.config.data_dir.join(snapshots::YAHOO_SNAPSHOT);
        snapshots::write_snapshot(&path, &records)?;
        Ok(records.len())
    }

    /// Fetch the Nasdaq feed for the configured tickers and persist it as a snapshot.
    pub async fn fetch_nasdaq(&self) -> Result<usize, PipelineError> {
        let finance = self.finance(Stage::FetchNasdaq)?;
        let records = finance
            .get_nasdaq_announcements(&self.config.tickers, self.config.max_workers)
            .await;

        let path = self.config.data_dir.join(snapshots::NASDAQ_SNAPSHOT);
        snapshots::write_snapshot(&path, &records)?;
        Ok(records.len())
    }

    /// Normalize raw price files into daily returns and store them.
    pub async fn ingest_prices(&self) -> Result<usize, PipelineError> {
        let load = prices::load_price_dir(&self.config.raw_prices_dir)?;
        prices::write_prices_csv(&self.config.data_dir.join("prices.csv"), &load)?;

        let panel = load.panel();
        let written = price_store::save_returns(&self.cache, &panel).await?;
        info!(
            tickers = panel.len(),
            returns = written,
            skipped_files = load.skipped.len(),
            "stored daily returns"
        );
        Ok(written)
    }

    /// Register and enrich ticker metadata for every ticker with a price file
    /// plus the configured list.
    pub async fn enrich_tickers(&self) -> Result<(), PipelineError> {
        let finance = self.finance(Stage::Tickers)?;
        let mut symbols = prices::list_price_tickers(&self.config.raw_prices_dir);
        symbols.extend(self.config.tickers.iter().cloned());
        symbols.sort();
        symbols.dedup();

        let report = tickers::load_and_enrich(
            finance,
            &self.cache,
            &symbols,
            EnrichmentSettings {
                batch_size: self.config.batch_size,
                max_workers: self.config.max_workers,
                pause: self.config.batch_pause,
            },
        )
        .await?;
        info!(?report, "ticker enrichment finished");
        Ok(())
    }

    /// Reconcile both provider snapshots and upsert the canonical events.
    pub async fn merge_events(&self) -> Result<Reconciliation, PipelineError> {
        let yahoo = snapshots::load_snapshot(
            &self.config.data_dir.join(snapshots::file_name(SourceId::Yahoo)),
            SourceId::Yahoo,
        )?;
        let nasdaq = snapshots::load_snapshot(
            &self.config.data_dir.join(snapshots::file_name(SourceId::Nasdaq)),
            SourceId::Nasdaq,
        )?;

        let merged = reconcile(&yahoo, &nasdaq);
        let written = event_store::upsert_events(&self.cache, &merged.events).await?;
        info!(
            written,
            dropped = merged.dropped(),
            ties = merged.ties(),
            "upserted canonical events"
        );
        Ok(merged)
    }

    /// Compute outcomes for stored events (pending only unless
    /// `recompute_all`) and upsert them.
    pub async fn compute_outcomes(&self) -> Result<OutcomeBatch, PipelineError> {
        let mut events = event_store::load_events(&self.cache).await?;
        if !self.config.recompute_all {
            events = outcome_store::pending_events(&self.cache, events).await?;
        }
        if events.is_empty() {
            info!("No events to compute");
            return Ok(OutcomeBatch::default());
        }

        let tickers = tickers_with_benchmark(&events, &self.config.benchmark);
        let panel = price_store::load_returns(&self.cache, &tickers).await?;
        let batch = outcomes::compute_outcomes(&events, &panel, &self.config.benchmark)?;

        for (event, reason) in &batch.skipped {
            warn!(%event, %reason, "outcome skipped");
        }
        let written = outcome_store::upsert_outcomes(&self.cache, &batch.outcomes).await?;
        info!(written, skipped = batch.skipped.len(), "upserted event outcomes");
        Ok(batch)
    }
}

/// Distinct event tickers plus the benchmark, sorted.
pub fn tickers_with_benchmark(events: &[CanonicalEvent], benchmark: &str) -> Vec<String> {
    let mut tickers: Vec<String> = events.iter().map(|e| e.ticker.to_uppercase()).collect();
    tickers.push(benchmark.to_uppercase());
    tickers.sort();
    tickers.dedup();
    tickers
}
