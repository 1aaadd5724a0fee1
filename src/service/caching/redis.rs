use redis::{aio::ConnectionManager, Client};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis url not set (REDIS_URL)")]
    MissingUrl,
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("stored payload is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Handle to the event / outcome / returns store. Clones share one
/// multiplexed connection.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Open a `ConnectionManager` for `url`. It reconnects on its own, so the
    /// pipeline builds one per run and hands out clones via [`Self::connection`].
    pub async fn new(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }

    /// Connect using the configured URL, if any.
    pub async fn from_config(url: Option<&str>) -> Result<Self, CacheError> {
        let url = url.ok_or(CacheError::MissingUrl)?;
        Self::new(url).await
    }

    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }
}
