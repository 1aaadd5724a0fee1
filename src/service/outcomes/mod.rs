use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{
    CanonicalEvent, EventId, EventOutcome, Horizon, ReturnPanel, ReturnSeries, SessionBucket,
};

/// Calendar days after day0 that still belong to the reaction window.
pub const WINDOW_CALENDAR_DAYS: i64 = 7;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OutcomeError {
    #[error("benchmark {0} has no return series; abnormal returns cannot be computed")]
    MissingBenchmark(String),
}

/// Why a single event produced no outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    NoTickerSeries,
    NoTradingDayAfterClose,
    NoReturnOnEffectiveDate,
    EmptyWindow,
    BenchmarkMissingOnAnchor,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::NoTickerSeries => "no return series for ticker",
            SkipReason::NoTradingDayAfterClose => "no trading day after an after-close announcement",
            SkipReason::NoReturnOnEffectiveDate => "no return on the effective date",
            SkipReason::EmptyWindow => "empty reaction window",
            SkipReason::BenchmarkMissingOnAnchor => "benchmark has no return on the anchor date",
        };
        f.write_str(text)
    }
}

/// Outcomes for a batch plus the events that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutcomeBatch {
    pub outcomes: Vec<EventOutcome>,
    pub skipped: Vec<(EventId, SkipReason)>,
}

/// Pick day0: the next trading date for after-close announcements, the
/// effective date itself otherwise (including `Unknown`).
pub fn select_anchor(event: &CanonicalEvent, ticker: &ReturnSeries) -> Result<NaiveDate, SkipReason> {
    match event.session {
        SessionBucket::AfterClose => ticker
            .first_date_after(event.effective_date)
            .ok_or(SkipReason::NoTradingDayAfterClose),
        SessionBucket::BeforeOpen | SessionBucket::DuringSession | SessionBucket::Unknown => {
            if ticker.contains(event.effective_date) {
                Ok(event.effective_date)
            } else {
                Err(SkipReason::NoReturnOnEffectiveDate)
            }
        }
    }
}

/// Trading dates of `ticker` from day0 through day0 + 7 calendar days.
pub fn reaction_window(ticker: &ReturnSeries, day0: NaiveDate) -> Vec<(NaiveDate, f64)> {
    let end = day0 + Duration::days(WINDOW_CALENDAR_DAYS);
    ticker.range(day0..=end).collect()
}

/// Ticker return minus benchmark return, summed over the first `k` window
/// dates. `None` when the window is shorter than `k` or the benchmark lacks
/// one of those dates.
fn abnormal_return(
    window: &[(NaiveDate, f64)],
    benchmark: &ReturnSeries,
    horizon: Horizon,
) -> Option<f64> {
    let k = horizon.trading_days();
    if window.len() < k {
        return None;
    }

    let mut ticker_sum = 0.0;
    let mut benchmark_sum = 0.0;
    for (date, ret) in &window[..k] {
        ticker_sum += ret;
        benchmark_sum += benchmark.get(*date)?;
    }
    Some(ticker_sum - benchmark_sum)
}

/// Compute AR_1D / AR_3D / AR_1W for a single event.
pub fn compute_outcome(
    event: &CanonicalEvent,
    ticker: &ReturnSeries,
    benchmark: &ReturnSeries,
) -> Result<EventOutcome, SkipReason> {
    let day0 = select_anchor(event, ticker)?;
    let window = reaction_window(ticker, day0);
    if window.is_empty() {
        return Err(SkipReason::EmptyWindow);
    }
    if !benchmark.contains(day0) {
        return Err(SkipReason::BenchmarkMissingOnAnchor);
    }

    let ar_1d =
        abnormal_return(&window, benchmark, Horizon::OneDay).ok_or(SkipReason::BenchmarkMissingOnAnchor)?;

    Ok(EventOutcome {
        event: event.id(),
        announced_at: event.announced_at,
        session: event.session,
        eps_surprise_pct: event.eps_surprise_pct,
        anchor_date: day0,
        window_len: window.len(),
        ar_1d,
        ar_3d: abnormal_return(&window, benchmark, Horizon::ThreeDay),
        ar_1w: abnormal_return(&window, benchmark, Horizon::OneWeek),
    })
}

/// Compute outcomes for every event against `benchmark`.
///
/// A benchmark missing from the panel aborts the whole batch; everything else
/// is a per-event skip.
pub fn compute_outcomes(
    events: &[CanonicalEvent],
    panel: &ReturnPanel,
    benchmark: &str,
) -> Result<OutcomeBatch, OutcomeError> {
    let benchmark_series = panel
        .get(benchmark)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| OutcomeError::MissingBenchmark(benchmark.to_string()))?;

    let mut batch = OutcomeBatch::default();
    for event in events {
        let result = match panel.get(&event.ticker) {
            Some(series) => compute_outcome(event, series, benchmark_series),
            None => Err(SkipReason::NoTickerSeries),
        };

        match result {
            Ok(outcome) => batch.outcomes.push(outcome),
            Err(reason) => {
                debug!(event = %event.id(), %reason, "skipping outcome");
                batch.skipped.push((event.id(), reason));
            }
        }
    }

    info!(
        computed = batch.outcomes.len(),
        skipped = batch.skipped.len(),
        benchmark,
        "computed event outcomes"
    );
    Ok(batch)
}
