use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::{CanonicalEvent, EventId, RawAnnouncement, SessionBucket, SourceId};
use crate::service::events::timing;

/// Why a raw record never became a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DropReason {
    EmptyTicker,
    MissingTimestamp,
    MissingReportedEps,
    MissingConsensusEps,
    NonFiniteEps,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DropReason::EmptyTicker => "empty ticker",
            DropReason::MissingTimestamp => "missing announcement timestamp",
            DropReason::MissingReportedEps => "missing reported EPS",
            DropReason::MissingConsensusEps => "missing consensus EPS",
            DropReason::NonFiniteEps => "non-finite EPS value",
        };
        f.write_str(text)
    }
}

/// Non-fatal observations made while reconciling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Diagnostic {
    Dropped {
        ticker: String,
        source: SourceId,
        reason: DropReason,
    },
    /// Several records from the winning source shared a (ticker, date) key;
    /// the earliest timestamp was kept.
    AmbiguousTie {
        event: EventId,
        source: SourceId,
        candidates: usize,
    },
    /// A lower-priority record lost to the winner.
    Superseded {
        event: EventId,
        winner: SourceId,
        loser: SourceId,
    },
}

/// Canonical events plus everything that was dropped or resolved on the way.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciliation {
    pub events: Vec<CanonicalEvent>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Reconciliation {
    pub fn dropped(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::Dropped { .. }))
            .count()
    }

    pub fn ties(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::AmbiguousTie { .. }))
            .count()
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    announced_at: DateTime<Utc>,
    session: SessionBucket,
    reported_eps: f64,
    consensus_eps: f64,
    source: SourceId,
}

/// `(actual - consensus) / |consensus|`, undefined for a zero consensus.
pub fn eps_surprise_pct(reported: f64, consensus: f64) -> Option<f64> {
    if consensus == 0.0 {
        return None;
    }
    Some((reported - consensus) / consensus.abs())
}

/// Merge both provider feeds into one event per (ticker, effective date).
///
/// Yahoo records always beat Nasdaq records; within one source the earliest
/// announcement wins, and input order settles exact duplicates.
pub fn reconcile(primary: &[RawAnnouncement], secondary: &[RawAnnouncement]) -> Reconciliation {
    let mut diagnostics = Vec::new();
    let mut groups: BTreeMap<(String, NaiveDate), Vec<Candidate>> = BTreeMap::new();

    for raw in primary.iter().chain(secondary.iter()) {
        match candidate_from(raw) {
            Ok((ticker, date, candidate)) => {
                groups.entry((ticker, date)).or_default().push(candidate);
            }
            Err(reason) => {
                warn!(
                    ticker = %raw.ticker,
                    source = %raw.source,
                    %reason,
                    "dropping announcement record"
                );
                diagnostics.push(Diagnostic::Dropped {
                    ticker: raw.ticker.clone(),
                    source: raw.source,
                    reason,
                });
            }
        }
    }

    let mut events = Vec::with_capacity(groups.len());
    for ((ticker, effective_date), candidates) in groups {
        let Some(winner) = candidates
            .iter()
            .min_by_key(|c| (c.source.priority(), c.announced_at))
        else {
            continue;
        };
        let event_id = EventId::new(ticker.clone(), effective_date);

        let same_source = candidates
            .iter()
            .filter(|c| c.source == winner.source)
            .count();
        if same_source > 1 {
            debug!(event = %event_id, source = %winner.source, same_source, "resolved equal-priority tie");
            diagnostics.push(Diagnostic::AmbiguousTie {
                event: event_id.clone(),
                source: winner.source,
                candidates: same_source,
            });
        }

        let mut losers: Vec<SourceId> = candidates
            .iter()
            .map(|c| c.source)
            .filter(|s| *s != winner.source)
            .collect();
        losers.sort();
        losers.dedup();
        for loser in losers {
            diagnostics.push(Diagnostic::Superseded {
                event: event_id.clone(),
                winner: winner.source,
                loser,
            });
        }

        events.push(CanonicalEvent {
            ticker,
            announced_at: winner.announced_at,
            session: winner.session,
            effective_date,
            reported_eps: winner.reported_eps,
            consensus_eps: winner.consensus_eps,
            eps_surprise_pct: eps_surprise_pct(winner.reported_eps, winner.consensus_eps),
            source: winner.source,
        });
    }

    info!(
        events = events.len(),
        input = primary.len() + secondary.len(),
        "reconciled earnings announcements"
    );

    Reconciliation {
        events,
        diagnostics,
    }
}

fn candidate_from(raw: &RawAnnouncement) -> Result<(String, NaiveDate, Candidate), DropReason> {
    let ticker = raw.ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(DropReason::EmptyTicker);
    }

    let (bucket, date) = timing::classify(raw.announced_at);
    let (Some(announced_at), Some(effective_date)) = (raw.announced_at, date) else {
        return Err(DropReason::MissingTimestamp);
    };

    let reported_eps = raw.reported_eps.ok_or(DropReason::MissingReportedEps)?;
    let consensus_eps = raw.consensus_eps.ok_or(DropReason::MissingConsensusEps)?;
    if !reported_eps.is_finite() || !consensus_eps.is_finite() {
        return Err(DropReason::NonFiniteEps);
    }

    let session = if raw.time_of_day_known {
        bucket
    } else {
        SessionBucket::Unknown
    };

    Ok((
        ticker,
        effective_date,
        Candidate {
            announced_at,
            session,
            reported_eps,
            consensus_eps,
            source: raw.source,
        },
    ))
}
