use std::env;
use std::sync::Arc;

use anyhow::Result;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use earnings_outcomes::config::PipelineConfig;
use earnings_outcomes::service::caching::RedisCache;
use earnings_outcomes::service::finance::FinanceService;
use earnings_outcomes::service::pipeline::{Pipeline, Stage};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .compact()
        .init();

    let stage: Stage = env::args()
        .nth(1)
        .as_deref()
        .unwrap_or("all")
        .parse()?;

    let config = PipelineConfig::from_env()?;
    info!(?stage, benchmark = %config.benchmark, "Starting earnings pipeline");

    info!("Connecting to Redis...");
    let cache = RedisCache::from_config(config.redis_url.as_deref()).await?;

    let mut pipeline = Pipeline::new(config.clone(), cache);
    if stage.requires_finance() {
        info!("Initializing FinanceService...");
        let finance = FinanceService::new(config.yahoo_proxy.clone(), config.http_timeout)?;
        pipeline = pipeline.with_finance(Arc::new(finance));
    }

    pipeline.run(stage).await?;
    info!(?stage, "Pipeline stage finished");

    Ok(())
}
