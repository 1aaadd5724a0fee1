use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use earnings_outcomes::models::{RawAnnouncement, SessionBucket, SourceId};
use earnings_outcomes::service::events::timing::date_only_instant;
use earnings_outcomes::service::events::{eps_surprise_pct, reconcile, Diagnostic, DropReason};

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn yahoo(ticker: &str, at: DateTime<Utc>, actual: f64, consensus: f64) -> RawAnnouncement {
    RawAnnouncement {
        ticker: ticker.to_string(),
        announced_at: Some(at),
        reported_eps: Some(actual),
        consensus_eps: Some(consensus),
        source: SourceId::Yahoo,
        time_of_day_known: true,
    }
}

fn nasdaq(ticker: &str, day: NaiveDate, actual: f64, consensus: f64) -> RawAnnouncement {
    RawAnnouncement {
        ticker: ticker.to_string(),
        announced_at: date_only_instant(day),
        reported_eps: Some(actual),
        consensus_eps: Some(consensus),
        source: SourceId::Nasdaq,
        time_of_day_known: false,
    }
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-12
}

#[test]
fn yahoo_wins_even_with_the_later_timestamp() {
    // 16:05 ET vs a noon-anchored Nasdaq record on the same date.
    let a = vec![yahoo("AAPL", utc(2024, 1, 25, 21, 5), 2.18, 2.10)];
    let b = vec![nasdaq("AAPL", date(2024, 1, 25), 2.20, 2.00)];

    let merged = reconcile(&a, &b);
    assert_eq!(merged.events.len(), 1);
    let event = &merged.events[0];
    assert_eq!(event.source, SourceId::Yahoo);
    assert_eq!(event.session, SessionBucket::AfterClose);
    assert_eq!(event.effective_date, date(2024, 1, 25));
    assert!(approx(event.reported_eps, 2.18));
    assert!(merged.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::Superseded { winner: SourceId::Yahoo, loser: SourceId::Nasdaq, .. }
    )));
}

#[test]
fn yahoo_wins_even_with_the_earlier_timestamp() {
    // 08:00 ET vs noon ET.
    let a = vec![yahoo("MSFT", utc(2024, 1, 25, 13, 0), 1.0, 1.0)];
    let b = vec![nasdaq("MSFT", date(2024, 1, 25), 3.0, 1.0)];

    let merged = reconcile(&a, &b);
    assert_eq!(merged.events.len(), 1);
    assert_eq!(merged.events[0].source, SourceId::Yahoo);
    assert_eq!(merged.events[0].session, SessionBucket::BeforeOpen);
}

#[test]
fn nasdaq_only_event_has_unknown_session() {
    let merged = reconcile(&[], &[nasdaq("tsla", date(2024, 1, 24), 0.71, 0.74)]);

    assert_eq!(merged.events.len(), 1);
    let event = &merged.events[0];
    assert_eq!(event.ticker, "TSLA");
    assert_eq!(event.session, SessionBucket::Unknown);
    assert_eq!(event.effective_date, date(2024, 1, 24));
    assert_eq!(event.source, SourceId::Nasdaq);
}

#[test]
fn zero_consensus_gives_null_surprise() {
    let merged = reconcile(&[yahoo("ZERO", utc(2024, 2, 1, 12, 0), 0.05, 0.0)], &[]);

    assert_eq!(merged.events.len(), 1);
    assert_eq!(merged.events[0].eps_surprise_pct, None);
    assert_eq!(eps_surprise_pct(1.0, 0.0), None);
    assert_eq!(eps_surprise_pct(-1.0, -0.0), None);
}

#[test]
fn surprise_is_relative_to_absolute_consensus() {
    assert!(approx(eps_surprise_pct(1.10, 1.00).unwrap(), 0.10000000000000009));
    // A smaller loss than expected is a positive surprise.
    assert!(approx(eps_surprise_pct(-0.40, -0.50).unwrap(), 0.2));
    assert!(eps_surprise_pct(0.9, 1.0).unwrap() < 0.0);
}

#[test]
fn malformed_records_are_dropped_without_aborting_the_rest() {
    let mut missing_ts = yahoo("AAA", utc(2024, 1, 25, 21, 0), 1.0, 1.0);
    missing_ts.announced_at = None;
    let mut missing_actual = yahoo("BBB", utc(2024, 1, 25, 21, 0), 1.0, 1.0);
    missing_actual.reported_eps = None;
    let mut missing_consensus = nasdaq("CCC", date(2024, 1, 25), 1.0, 1.0);
    missing_consensus.consensus_eps = None;
    let mut not_finite = yahoo("DDD", utc(2024, 1, 25, 21, 0), f64::NAN, 1.0);
    not_finite.reported_eps = Some(f64::NAN);
    let blank = yahoo("  ", utc(2024, 1, 25, 21, 0), 1.0, 1.0);
    let good = yahoo("EEE", utc(2024, 1, 25, 21, 0), 1.2, 1.0);

    let merged = reconcile(
        &[missing_ts, missing_actual, not_finite, blank, good],
        &[missing_consensus],
    );

    assert_eq!(merged.events.len(), 1);
    assert_eq!(merged.events[0].ticker, "EEE");
    assert_eq!(merged.dropped(), 5);

    let reasons: Vec<DropReason> = merged
        .diagnostics
        .iter()
        .filter_map(|d| match d {
            Diagnostic::Dropped { reason, .. } => Some(*reason),
            _ => None,
        })
        .collect();
    assert!(reasons.contains(&DropReason::MissingTimestamp));
    assert!(reasons.contains(&DropReason::MissingReportedEps));
    assert!(reasons.contains(&DropReason::MissingConsensusEps));
    assert!(reasons.contains(&DropReason::NonFiniteEps));
    assert!(reasons.contains(&DropReason::EmptyTicker));
}

#[test]
fn equal_priority_tie_keeps_earliest_and_is_reported() {
    let early = yahoo("NVDA", utc(2024, 2, 21, 21, 20), 5.16, 4.59);
    let late = yahoo("NVDA", utc(2024, 2, 21, 22, 0), 9.99, 4.59);

    let forward = reconcile(&[early.clone(), late.clone()], &[]);
    let backward = reconcile(&[late, early], &[]);

    assert_eq!(forward.events.len(), 1);
    assert!(approx(forward.events[0].reported_eps, 5.16));
    assert_eq!(forward.events, backward.events);
    assert_eq!(forward.ties(), 1);
    assert!(forward.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::AmbiguousTie { source: SourceId::Yahoo, candidates: 2, .. }
    )));
}

#[test]
fn different_effective_dates_stay_separate_events() {
    let a = vec![
        yahoo("AMZN", utc(2024, 2, 1, 21, 0), 1.0, 0.8),
        yahoo("AMZN", utc(2023, 10, 26, 20, 0), 0.94, 0.58),
    ];
    let b = vec![nasdaq(" amzn", date(2024, 2, 1), 1.0, 0.8)];

    let merged = reconcile(&a, &b);
    assert_eq!(merged.events.len(), 2);
    assert!(merged.events.iter().all(|e| e.source == SourceId::Yahoo));
    assert!(merged.events.iter().all(|e| e.ticker == "AMZN"));
}

#[test]
fn reconciliation_is_idempotent() {
    let a = vec![
        yahoo("AAPL", utc(2024, 2, 1, 21, 30), 2.18, 2.10),
        yahoo("ZERO", utc(2024, 2, 1, 12, 0), 0.05, 0.0),
    ];
    let b = vec![
        nasdaq("AAPL", date(2024, 2, 1), 2.18, 2.11),
        nasdaq("GOOG", date(2024, 1, 30), 1.64, 1.59),
    ];

    let first = reconcile(&a, &b);
    let second = reconcile(&a, &b);

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first.events).unwrap(),
        serde_json::to_string(&second.events).unwrap()
    );
}
