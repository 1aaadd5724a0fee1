use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{ReturnPanel, ReturnSeries};
use crate::service::finance::{parse_calendar_date, parse_decimal};

const DATE_COLUMN: &str = "Date";
const CLOSE_COLUMN: &str = "Close/Last";

#[derive(Debug, Error)]
pub enum PriceFileError {
    #[error("price io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("price csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{0} missing required columns Date, Close/Last")]
    MissingColumns(PathBuf),
    #[error("no CSV files found in {0}")]
    NoFiles(PathBuf),
    #[error("no valid price files loaded from {0}")]
    NoValidFiles(PathBuf),
}

/// Cleaned closing prices for every ticker that loaded.
#[derive(Debug, Clone, Default)]
pub struct PriceLoad {
    pub closes: BTreeMap<String, BTreeMap<NaiveDate, f64>>,
    pub skipped: Vec<(PathBuf, String)>,
}

impl PriceLoad {
    /// Daily simple returns for every loaded ticker.
    pub fn panel(&self) -> ReturnPanel {
        self.closes
            .iter()
            .map(|(ticker, closes)| {
                ReturnSeries::from_closes(ticker.clone(), closes.iter().map(|(d, c)| (*d, *c)))
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct PriceRow<'a> {
    ticker: &'a str,
    dt: NaiveDate,
    close: f64,
    ret: Option<f64>,
}

fn csv_files(dir: &Path) -> Result<Vec<PathBuf>, PriceFileError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

fn ticker_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
}

/// Tickers that have a price file in `dir`; empty when the directory is absent.
pub fn list_price_tickers(dir: &Path) -> Vec<String> {
    if !dir.exists() {
        warn!("Warning: {} directory not found", dir.display());
        return Vec::new();
    }
    match csv_files(dir) {
        Ok(files) => files.iter().filter_map(|p| ticker_from_path(p)).collect(),
        Err(err) => {
            warn!("Failed to list {}: {}", dir.display(), err);
            Vec::new()
        }
    }
}

/// Load one Nasdaq historical price CSV into (date, close) observations.
///
/// Rows whose date or close cannot be parsed are dropped; a later row for the
/// same date replaces an earlier one.
pub fn load_price_file(path: &Path) -> Result<BTreeMap<NaiveDate, f64>, PriceFileError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let date_idx = headers.iter().position(|h| h == DATE_COLUMN);
    let close_idx = headers.iter().position(|h| h == CLOSE_COLUMN);
    let (Some(date_idx), Some(close_idx)) = (date_idx, close_idx) else {
        return Err(PriceFileError::MissingColumns(path.to_path_buf()));
    };

    let mut closes = BTreeMap::new();
    for record in reader.records() {
        let Ok(record) = record else {
            continue;
        };
        let date = record.get(date_idx).and_then(parse_calendar_date);
        let close = record.get(close_idx).and_then(parse_decimal);
        if let (Some(date), Some(close)) = (date, close) {
            closes.insert(date, close);
        }
    }

    Ok(closes)
}

/// Load every price file in `dir`. Bad files are skipped with a reason.
pub fn load_price_dir(dir: &Path) -> Result<PriceLoad, PriceFileError> {
    let files = csv_files(dir)?;
    if files.is_empty() {
        return Err(PriceFileError::NoFiles(dir.to_path_buf()));
    }

    let mut load = PriceLoad::default();
    for path in files {
        let Some(ticker) = ticker_from_path(&path) else {
            continue;
        };
        match load_price_file(&path) {
            Ok(closes) if !closes.is_empty() => {
                load.closes.insert(ticker, closes);
            }
            Ok(_) => {
                warn!("Skipped {}: no usable rows", path.display());
                load.skipped.push((path, "no usable rows".to_string()));
            }
            Err(err) => {
                warn!("Skipped {}: {}", path.display(), err);
                load.skipped.push((path, err.to_string()));
            }
        }
    }

    if load.closes.is_empty() {
        return Err(PriceFileError::NoValidFiles(dir.to_path_buf()));
    }

    info!(
        "Loaded prices for {} tickers ({} files skipped)",
        load.closes.len(),
        load.skipped.len()
    );
    Ok(load)
}

/// Write the normalized `ticker,dt,close,ret` table.
pub fn write_prices_csv(path: &Path, load: &PriceLoad) -> Result<usize, PriceFileError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    let mut rows = 0usize;
    for (ticker, closes) in &load.closes {
        let mut prev: Option<f64> = None;
        for (dt, close) in closes {
            let ret = prev.filter(|p| *p != 0.0).map(|p| close / p - 1.0);
            writer.serialize(PriceRow {
                ticker,
                dt: *dt,
                close: *close,
                ret,
            })?;
            prev = Some(*close);
            rows += 1;
        }
    }
    writer.flush()?;

    info!(
        "Wrote {}  rows={} tickers={}",
        path.display(),
        rows,
        load.closes.len()
    );
    Ok(rows)
}
