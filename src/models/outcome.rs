use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{EventId, SessionBucket};

/// Abnormal-return horizons, measured in trading days from day0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Horizon {
    OneDay,
    ThreeDay,
    OneWeek,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::OneDay, Horizon::ThreeDay, Horizon::OneWeek];

    pub fn trading_days(self) -> usize {
        match self {
            Horizon::OneDay => 1,
            Horizon::ThreeDay => 3,
            Horizon::OneWeek => 5,
        }
    }
}

/// Benchmark-relative reaction to one canonical event.
///
/// `ar_3d` / `ar_1w` are `None` when the window is too short; they serialize
/// as `null`, never as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventOutcome {
    pub event: EventId,
    pub announced_at: DateTime<Utc>,
    pub session: SessionBucket,
    pub eps_surprise_pct: Option<f64>,
    pub anchor_date: NaiveDate,
    pub window_len: usize,
    pub ar_1d: f64,
    pub ar_3d: Option<f64>,
    pub ar_1w: Option<f64>,
}

impl EventOutcome {
    pub fn horizon(&self, horizon: Horizon) -> Option<f64> {
        match horizon {
            Horizon::OneDay => Some(self.ar_1d),
            Horizon::ThreeDay => self.ar_3d,
            Horizon::OneWeek => self.ar_1w,
        }
    }
}
