use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily simple returns for one ticker, ordered by date.
///
/// Non-trading days are absent rather than zero-filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    pub ticker: String,
    points: BTreeMap<NaiveDate, f64>,
}

impl ReturnSeries {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            points: BTreeMap::new(),
        }
    }

    /// Build from (date, return) pairs; a repeated date keeps the last value.
    pub fn from_points<I>(ticker: impl Into<String>, points: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        Self {
            ticker: ticker.into(),
            points: points.into_iter().collect(),
        }
    }

    /// Derive simple returns from closing prices.
    ///
    /// The first observation has no predecessor and yields no return, and a
    /// zero previous close is skipped.
    pub fn from_closes<I>(ticker: impl Into<String>, closes: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        let ordered: BTreeMap<NaiveDate, f64> = closes.into_iter().collect();
        let mut points = BTreeMap::new();
        let mut prev: Option<f64> = None;
        for (date, close) in ordered {
            if let Some(p) = prev {
                if p != 0.0 {
                    points.insert(date, close / p - 1.0);
                }
            }
            prev = Some(close);
        }
        Self {
            ticker: ticker.into(),
            points,
        }
    }

    pub fn insert(&mut self, date: NaiveDate, ret: f64) {
        self.points.insert(date, ret);
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points.get(&date).copied()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.points.contains_key(&date)
    }

    /// Earliest observation strictly after `date`.
    pub fn first_date_after(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.points
            .range(date.succ_opt()?..)
            .next()
            .map(|(d, _)| *d)
    }

    /// Observations within an inclusive date range, ascending.
    pub fn range(&self, dates: RangeInclusive<NaiveDate>) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.points.range(dates).map(|(d, r)| (*d, *r))
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.points.iter().map(|(d, r)| (*d, *r))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Return series for many tickers, keyed by upper-case ticker.
#[derive(Debug, Clone, Default)]
pub struct ReturnPanel {
    series: HashMap<String, ReturnSeries>,
}

impl ReturnPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, series: ReturnSeries) {
        self.series.insert(series.ticker.to_uppercase(), series);
    }

    pub fn get(&self, ticker: &str) -> Option<&ReturnSeries> {
        self.series.get(&ticker.to_uppercase())
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl FromIterator<ReturnSeries> for ReturnPanel {
    fn from_iter<I: IntoIterator<Item = ReturnSeries>>(iter: I) -> Self {
        let mut panel = Self::new();
        for series in iter {
            panel.insert(series);
        }
        panel
    }
}
