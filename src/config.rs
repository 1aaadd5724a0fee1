use std::env;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use thiserror::Error;

pub const DEFAULT_BENCHMARK: &str = "SPY";
pub const DEFAULT_TICKERS: [&str; 6] = ["AAPL", "MSFT", "GOOG", "TSLA", "NVDA", "AMZN"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a number, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("{key} must be true/false, got {value:?}")]
    InvalidBool { key: &'static str, value: String },
    #[error("{0} must be at least 1")]
    Zero(&'static str),
    #[error("{0} is set but empty")]
    Empty(&'static str),
}

/// Everything the pipeline needs, resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub redis_url: Option<String>,
    pub data_dir: PathBuf,
    pub raw_prices_dir: PathBuf,
    pub benchmark: String,
    pub tickers: Vec<String>,
    pub batch_size: usize,
    pub max_workers: usize,
    pub batch_pause: StdDuration,
    pub http_timeout: StdDuration,
    pub yahoo_proxy: Option<String>,
    pub recompute_all: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            data_dir: PathBuf::from("data"),
            raw_prices_dir: PathBuf::from("raw_prices"),
            benchmark: DEFAULT_BENCHMARK.to_string(),
            tickers: DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect(),
            batch_size: 200,
            max_workers: 8,
            batch_pause: StdDuration::from_millis(100),
            http_timeout: StdDuration::from_secs(10),
            yahoo_proxy: None,
            recompute_all: false,
        }
    }
}

impl PipelineConfig {
    /// Read configuration from the process environment (call `dotenv` first).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let tickers = match read("TICKERS") {
            Some(raw) => {
                let list: Vec<String> = raw
                    .split(',')
                    .map(|t| t.trim().to_uppercase())
                    .filter(|t| !t.is_empty())
                    .collect();
                if list.is_empty() {
                    return Err(ConfigError::Empty("TICKERS"));
                }
                list
            }
            None => defaults.tickers,
        };

        let batch_size = read_usize(read("BATCH_SIZE"), "BATCH_SIZE", defaults.batch_size)?;
        let max_workers = read_usize(read("MAX_WORKERS"), "MAX_WORKERS", defaults.max_workers)?;
        if batch_size == 0 {
            return Err(ConfigError::Zero("BATCH_SIZE"));
        }
        if max_workers == 0 {
            return Err(ConfigError::Zero("MAX_WORKERS"));
        }

        let pause_ms = read_usize(read("BATCH_PAUSE_MS"), "BATCH_PAUSE_MS", 100)?;
        let timeout_secs = read_usize(read("HTTP_TIMEOUT_SECS"), "HTTP_TIMEOUT_SECS", 10)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Zero("HTTP_TIMEOUT_SECS"));
        }

        let recompute_all = match read("RECOMPUTE_ALL") {
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidBool {
                        key: "RECOMPUTE_ALL",
                        value: raw,
                    })
                }
            },
            None => false,
        };

        Ok(Self {
            redis_url: read("REDIS_URL"),
            data_dir: read("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            raw_prices_dir: read("RAW_PRICES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.raw_prices_dir),
            benchmark: read("BENCHMARK_TICKER")
                .map(|b| b.to_uppercase())
                .unwrap_or(defaults.benchmark),
            tickers,
            batch_size,
            max_workers,
            batch_pause: StdDuration::from_millis(pause_ms as u64),
            http_timeout: StdDuration::from_secs(timeout_secs as u64),
            yahoo_proxy: read("YAHOO_PROXY"),
            recompute_all,
        })
    }
}

fn read_usize(raw: Option<String>, key: &'static str, default: usize) -> Result<usize, ConfigError> {
    match raw {
        Some(value) => value
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        None => Ok(default),
    }
}
