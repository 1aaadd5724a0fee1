use std::path::Path;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use chrono_tz::America::New_York;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{RawAnnouncement, SourceId};
use crate::service::events::timing::date_only_instant;
use crate::service::finance::{parse_calendar_date, parse_decimal};

pub const YAHOO_SNAPSHOT: &str = "yf_events.csv";
pub const NASDAQ_SNAPSHOT: &str = "nasdaq_events.csv";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot csv error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Default, Deserialize)]
struct SnapshotRow {
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default)]
    report_ts: Option<String>,
    #[serde(default)]
    eps_actual: Option<String>,
    #[serde(default)]
    eps_consensus: Option<String>,
}

#[derive(Debug, Serialize)]
struct SnapshotRecord<'a> {
    ticker: &'a str,
    report_ts: Option<String>,
    eps_actual: Option<f64>,
    eps_consensus: Option<f64>,
}

/// Snapshot file name for a provider.
pub fn file_name(source: SourceId) -> &'static str {
    match source {
        SourceId::Yahoo => YAHOO_SNAPSHOT,
        SourceId::Nasdaq => NASDAQ_SNAPSHOT,
    }
}

/// Parse a `report_ts` cell.
///
/// Returns the instant and whether it carried a time of day. Bare dates are
/// anchored at noon ET; anything unparseable is absent.
pub fn parse_report_ts(raw: &str) -> (Option<DateTime<Utc>>, bool) {
    let raw = raw.trim();
    if raw.is_empty() {
        return (None, false);
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return (Some(ts.with_timezone(&Utc)), true);
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return (Some(ts.with_timezone(&Utc)), true);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return (Some(naive.and_utc()), true);
        }
    }
    if let Some(date) = parse_calendar_date(raw) {
        return (date_only_instant(date), false);
    }

    (None, false)
}

/// Load a provider snapshot. A missing file is an empty feed, not an error.
pub fn load_snapshot(path: &Path, source: SourceId) -> Result<Vec<RawAnnouncement>, SnapshotError> {
    if !path.exists() {
        warn!("Snapshot {} not found; treating as empty", path.display());
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for row in reader.deserialize::<SnapshotRow>() {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                skipped += 1;
                warn!("Skipping unreadable row in {}: {}", path.display(), err);
                continue;
            }
        };

        let Some(ticker) = row
            .ticker
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
        else {
            skipped += 1;
            continue;
        };

        let (announced_at, time_of_day_known) = row
            .report_ts
            .as_deref()
            .map(parse_report_ts)
            .unwrap_or((None, false));

        records.push(RawAnnouncement {
            ticker,
            announced_at,
            reported_eps: row.eps_actual.as_deref().and_then(parse_decimal),
            consensus_eps: row.eps_consensus.as_deref().and_then(parse_decimal),
            source,
            time_of_day_known,
        });
    }

    info!(
        "Loaded {} {} rows from {} ({} skipped)",
        records.len(),
        source,
        path.display(),
        skipped
    );
    Ok(records)
}

/// Write announcements in the snapshot layout. Date-only records are written
/// back as their ET date so a reload keeps them date-only.
pub fn write_snapshot(path: &Path, records: &[RawAnnouncement]) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        let report_ts = record.announced_at.map(|ts| {
            if record.time_of_day_known {
                ts.to_rfc3339_opts(SecondsFormat::Secs, true)
            } else {
                ts.with_timezone(&New_York)
                    .date_naive()
                    .format("%Y-%m-%d")
                    .to_string()
            }
        });

        writer.serialize(SnapshotRecord {
            ticker: &record.ticker,
            report_ts,
            eps_actual: record.reported_eps,
            eps_consensus: record.consensus_eps,
        })?;
    }
    writer.flush()?;

    info!("wrote {}  rows={}", path.display(), records.len());
    Ok(())
}
