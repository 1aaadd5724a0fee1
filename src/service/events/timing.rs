use chrono::{DateTime, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::America::New_York;

use crate::models::SessionBucket;

/// 09:30 ET, in minutes since local midnight.
pub const MARKET_OPEN_MINUTE: u32 = 9 * 60 + 30;
/// 16:00 ET, in minutes since local midnight.
pub const MARKET_CLOSE_MINUTE: u32 = 16 * 60;

/// Session bucket plus the ET calendar date an announcement is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    pub bucket: SessionBucket,
    pub effective_date: NaiveDate,
}

/// Classify an optional instant. Absent instants map to `(Unknown, None)` and
/// callers must skip them.
pub fn classify(instant: Option<DateTime<Utc>>) -> (SessionBucket, Option<NaiveDate>) {
    match instant {
        Some(ts) => {
            let timing = classify_instant(ts);
            (timing.bucket, Some(timing.effective_date))
        }
        None => (SessionBucket::Unknown, None),
    }
}

/// Convert to America/New_York (DST-aware) and bucket by local wall-clock time.
pub fn classify_instant(instant: DateTime<Utc>) -> SessionTiming {
    let local = instant.with_timezone(&New_York);
    let minute_of_day = local.hour() * 60 + local.minute();

    SessionTiming {
        bucket: bucket_for_minute(minute_of_day),
        effective_date: local.date_naive(),
    }
}

pub fn bucket_for_minute(minute_of_day: u32) -> SessionBucket {
    if minute_of_day < MARKET_OPEN_MINUTE {
        SessionBucket::BeforeOpen
    } else if minute_of_day >= MARKET_CLOSE_MINUTE {
        SessionBucket::AfterClose
    } else {
        SessionBucket::DuringSession
    }
}

/// Anchor a date-only report at 12:00 ET so its effective date is the
/// reported date itself.
pub fn date_only_instant(date: NaiveDate) -> Option<DateTime<Utc>> {
    let noon = date.and_hms_opt(12, 0, 0)?;
    New_York
        .from_local_datetime(&noon)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}
