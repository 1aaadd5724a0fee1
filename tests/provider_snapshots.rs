use std::fs;

use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};
use tempfile::tempdir;

use earnings_outcomes::models::{SessionBucket, SourceId};
use earnings_outcomes::service::events::reconcile;
use earnings_outcomes::service::finance::nasdaq::parse_surprise_payload;
use earnings_outcomes::service::finance::yahoo::parse_earnings_summary;
use earnings_outcomes::service::finance::snapshots::{
    load_snapshot, parse_report_ts, write_snapshot, NASDAQ_SNAPSHOT, YAHOO_SNAPSHOT,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

const YAHOO_ROWS: &str = "ticker,report_ts,amc_bmo,eps_actual,eps_consensus
aapl,2024-02-01 21:30:00,AMC,2.18,2.10
MSFT,2024-01-30T21:05:00Z,AMC,2.93,2.78
TSLA,,UNKNOWN,0.71,0.74
NVDA,2024-02-21 21:20:00+00:00,AMC,N/A,4.59
,2024-02-21,AMC,1,1
";

const NASDAQ_BODY: &str = r#"{
  "data": {
    "symbol": "AAPL",
    "earningsSurpriseTable": {
      "headers": {},
      "rows": [
        {"fiscalQtrEnding": "Dec 2023", "dateReported": "2/1/2024", "eps": 2.18, "consensusForecast": "2.10", "percentageSurprise": "3.81"},
        {"fiscalQtrEnding": "Sep 2023", "dateReported": "11/2/2023", "eps": "1.46", "consensusForecast": "N/A"}
      ]
    }
  },
  "message": null,
  "status": {"rCode": 200}
}"#;

#[test]
fn report_ts_formats() {
    let (ts, known) = parse_report_ts("2024-02-01 21:30:00");
    assert_eq!(ts, Some(Utc.with_ymd_and_hms(2024, 2, 1, 21, 30, 0).unwrap()));
    assert!(known);

    let (ts, known) = parse_report_ts("2024-02-01T16:30:00-05:00");
    assert_eq!(ts, Some(Utc.with_ymd_and_hms(2024, 2, 1, 21, 30, 0).unwrap()));
    assert!(known);

    let (ts, known) = parse_report_ts("2024-02-01");
    assert_eq!(ts, Some(Utc.with_ymd_and_hms(2024, 2, 1, 17, 0, 0).unwrap()));
    assert!(!known);

    assert_eq!(parse_report_ts("soon"), (None, false));
    assert_eq!(parse_report_ts("  "), (None, false));
}

#[test]
fn loads_yahoo_snapshot_leniently() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join(YAHOO_SNAPSHOT);
    fs::write(&path, YAHOO_ROWS)?;

    let records = load_snapshot(&path, SourceId::Yahoo)?;

    assert_eq!(records.len(), 4);
    assert_eq!(records[0].ticker, "AAPL");
    assert!(records[0].time_of_day_known);
    assert_eq!(records[2].ticker, "TSLA");
    assert_eq!(records[2].announced_at, None);
    assert_eq!(records[3].reported_eps, None);
    assert_eq!(records[3].consensus_eps, Some(4.59));
    assert!(records.iter().all(|r| r.source == SourceId::Yahoo));

    // TSLA (no timestamp) and NVDA (no actual) never become events.
    let merged = reconcile(&records, &[]);
    assert_eq!(merged.events.len(), 2);
    assert_eq!(merged.dropped(), 2);
    Ok(())
}

#[test]
fn missing_snapshot_is_an_empty_feed() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let records = load_snapshot(&dir.path().join(NASDAQ_SNAPSHOT), SourceId::Nasdaq)?;
    assert!(records.is_empty());
    Ok(())
}

#[test]
fn nasdaq_payload_becomes_date_only_records() -> Result<(), Box<dyn std::error::Error>> {
    let records = parse_surprise_payload("aapl", NASDAQ_BODY.as_bytes())?;

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].ticker, "AAPL");
    assert_eq!(records[0].source, SourceId::Nasdaq);
    assert!(!records[0].time_of_day_known);
    assert_eq!(records[0].reported_eps, Some(2.18));
    assert_eq!(records[0].consensus_eps, Some(2.10));
    assert_eq!(records[1].reported_eps, Some(1.46));
    assert_eq!(records[1].consensus_eps, None);

    let merged = reconcile(&[], &records);
    assert_eq!(merged.events.len(), 1);
    assert_eq!(merged.events[0].effective_date, date(2024, 2, 1));
    assert_eq!(merged.events[0].session, SessionBucket::Unknown);
    Ok(())
}

#[test]
fn nasdaq_payload_without_table_is_empty() -> Result<(), Box<dyn std::error::Error>> {
    assert!(parse_surprise_payload("XYZ", br#"{"data": null}"#)?.is_empty());
    assert!(parse_surprise_payload("XYZ", b"<html>blocked</html>").is_err());
    Ok(())
}

#[test]
fn written_nasdaq_snapshot_reloads_as_date_only() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("nested").join(NASDAQ_SNAPSHOT);
    let records = parse_surprise_payload("AAPL", NASDAQ_BODY.as_bytes())?;

    write_snapshot(&path, &records)?;
    let text = fs::read_to_string(&path)?;
    assert!(text.contains("AAPL,2024-02-01,2.18,2.1"));

    let reloaded = load_snapshot(&path, SourceId::Nasdaq)?;
    assert_eq!(reloaded, records);
    Ok(())
}

/// quoteSummary for AAPL: reported 2024-02-01 21:30 UTC for the quarter ended
/// 2023-12-30, plus an older quarter.
fn yahoo_summary(earnings_date: i64, estimated: bool) -> Value {
    json!({
        "quoteSummary": {
            "result": [{
                "calendarEvents": {
                    "earnings": {
                        "earningsDate": [earnings_date],
                        "earningsAverage": {"raw": 2.11, "fmt": "2.11"},
                        "isEarningsDateEstimate": estimated
                    }
                },
                "earningsHistory": {
                    "history": [
                        {"quarter": 1696032000, "epsActual": 1.46, "epsEstimate": 1.39, "period": "-2q"},
                        {"quarter": 1703894400, "epsActual": 2.18, "epsEstimate": 2.1, "period": "-1q"}
                    ]
                }
            }],
            "error": null
        }
    })
}

#[test]
fn yahoo_summary_becomes_timed_records() -> Result<(), Box<dyn std::error::Error>> {
    let as_of = Utc.with_ymd_and_hms(2024, 2, 5, 0, 0, 0).unwrap();
    let records = parse_earnings_summary("aapl", &yahoo_summary(1706823000, false), as_of)?;

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.ticker, "AAPL");
    assert_eq!(record.source, SourceId::Yahoo);
    assert!(record.time_of_day_known);
    assert_eq!(
        record.announced_at,
        Some(Utc.with_ymd_and_hms(2024, 2, 1, 21, 30, 0).unwrap())
    );
    assert_eq!(record.reported_eps, Some(2.18));
    assert_eq!(record.consensus_eps, Some(2.1));

    let merged = reconcile(&records, &[]);
    assert_eq!(merged.events.len(), 1);
    assert_eq!(merged.events[0].session, SessionBucket::AfterClose);
    assert_eq!(merged.events[0].effective_date, date(2024, 2, 1));
    Ok(())
}

#[test]
fn upcoming_yahoo_date_has_only_the_consensus() -> Result<(), Box<dyn std::error::Error>> {
    let as_of = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
    let records = parse_earnings_summary("AAPL", &yahoo_summary(1706823000, false), as_of)?;

    assert_eq!(records[0].reported_eps, None);
    assert_eq!(records[0].consensus_eps, Some(2.11));
    Ok(())
}

#[test]
fn estimated_yahoo_date_is_date_only() -> Result<(), Box<dyn std::error::Error>> {
    // 2024-04-25 00:00 UTC; the newest quarter ended 117 days earlier.
    let as_of = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    let records = parse_earnings_summary("AAPL", &yahoo_summary(1714003200, true), as_of)?;

    assert!(!records[0].time_of_day_known);
    assert_eq!(
        records[0].announced_at,
        Some(Utc.with_ymd_and_hms(2024, 4, 25, 16, 0, 0).unwrap())
    );
    assert_eq!(records[0].reported_eps, None);
    assert_eq!(records[0].consensus_eps, Some(2.11));
    Ok(())
}

#[test]
fn yahoo_summary_without_result_or_calendar() -> Result<(), Box<dyn std::error::Error>> {
    let as_of = Utc.with_ymd_and_hms(2024, 2, 5, 0, 0, 0).unwrap();

    let empty = json!({"quoteSummary": {"result": [], "error": null}});
    assert!(parse_earnings_summary("XYZ", &empty, as_of).is_err());

    let no_calendar = json!({"quoteSummary": {"result": [{"earningsHistory": {"history": []}}]}});
    assert!(parse_earnings_summary("XYZ", &no_calendar, as_of)?.is_empty());
    Ok(())
}

#[test]
fn written_yahoo_snapshot_reloads_with_time_of_day() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join(YAHOO_SNAPSHOT);
    let as_of = Utc.with_ymd_and_hms(2024, 2, 5, 0, 0, 0).unwrap();
    let records = parse_earnings_summary("AAPL", &yahoo_summary(1706823000, false), as_of)?;

    write_snapshot(&path, &records)?;
    let text = fs::read_to_string(&path)?;
    assert!(text.contains("AAPL,2024-02-01T21:30:00Z,2.18,2.1"));

    let reloaded = load_snapshot(&path, SourceId::Yahoo)?;
    assert_eq!(reloaded, records);
    Ok(())
}
