use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Provider an announcement record came from.
///
/// Declaration order is priority order: Yahoo outranks Nasdaq whenever both
/// report the same ticker on the same effective date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceId {
    #[serde(rename = "yfinance")]
    Yahoo,
    #[serde(rename = "nasdaq")]
    Nasdaq,
}

impl SourceId {
    /// Lower ranks win reconciliation.
    pub fn priority(self) -> u8 {
        match self {
            SourceId::Yahoo => 0,
            SourceId::Nasdaq => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceId::Yahoo => "yfinance",
            SourceId::Nasdaq => "nasdaq",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an announcement falls relative to the regular US session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionBucket {
    BeforeOpen,
    AfterClose,
    DuringSession,
    Unknown,
}

impl SessionBucket {
    /// Short label used in reports (BMO/AMC/INTRADAY/UNKNOWN).
    pub fn label(self) -> &'static str {
        match self {
            SessionBucket::BeforeOpen => "BMO",
            SessionBucket::AfterClose => "AMC",
            SessionBucket::DuringSession => "INTRADAY",
            SessionBucket::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SessionBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One announcement as reported by a single provider, before reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAnnouncement {
    pub ticker: String,
    pub announced_at: Option<DateTime<Utc>>,
    pub reported_eps: Option<f64>,
    pub consensus_eps: Option<f64>,
    pub source: SourceId,
    /// False for feeds that only publish a calendar date (no BMO/AMC info).
    pub time_of_day_known: bool,
}

/// Identity of a canonical event: one per ticker and effective date.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId {
    pub ticker: String,
    pub effective_date: NaiveDate,
}

impl EventId {
    pub fn new(ticker: impl Into<String>, effective_date: NaiveDate) -> Self {
        Self {
            ticker: ticker.into(),
            effective_date,
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ticker, self.effective_date.format("%Y-%m-%d"))
    }
}

/// Deduplicated earnings event produced by the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub ticker: String,
    pub announced_at: DateTime<Utc>,
    pub session: SessionBucket,
    pub effective_date: NaiveDate,
    pub reported_eps: f64,
    pub consensus_eps: f64,
    pub eps_surprise_pct: Option<f64>,
    pub source: SourceId,
}

impl CanonicalEvent {
    pub fn id(&self) -> EventId {
        EventId::new(self.ticker.clone(), self.effective_date)
    }
}
