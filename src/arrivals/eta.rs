use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};
use std::fmt;

/// Delay above which an arrival is flagged as delayed, in seconds
pub const DELAY_THRESHOLD_SECS: i32 = 60;

const MINUTE_MS: i64 = 60_000;

/// Display bucket of an estimated arrival
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtaLabel {
    Unknown,
    Due,
    Minutes(i64),
    /// One hour or more ahead, shown as local clock time
    At(NaiveTime),
}

impl EtaLabel {
    pub fn is_due(&self) -> bool {
        matches!(self, EtaLabel::Due)
    }
}

impl fmt::Display for EtaLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtaLabel::Unknown => f.write_str("Unknown"),
            EtaLabel::Due => f.write_str("Due"),
            EtaLabel::Minutes(1) => f.write_str("1 min"),
            EtaLabel::Minutes(n) => write!(f, "{n} min"),
            EtaLabel::At(time) => write!(f, "{}", time.format("%H:%M")),
        }
    }
}

impl Serialize for EtaLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Whole minutes from `now` to `arrival`, rounded half up.
pub fn minutes_until(arrival: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let diff_ms = (arrival - now).num_milliseconds();
    (diff_ms + MINUTE_MS / 2).div_euclid(MINUTE_MS)
}

/// Buckets an arrival time relative to `now`.
///
/// `now` must be taken at render time; labels computed from a fetch-time `now`
/// drift by the age of the data.
pub fn compute_eta(arrival: Option<DateTime<Utc>>, now: DateTime<Utc>, tz: Tz) -> EtaLabel {
    let Some(arrival) = arrival else {
        return EtaLabel::Unknown;
    };

    match minutes_until(arrival, now) {
        m if m <= 0 => EtaLabel::Due,
        m if m < 60 => EtaLabel::Minutes(m),
        _ => EtaLabel::At(arrival.with_timezone(&tz).time()),
    }
}

/// More than one minute behind schedule
pub fn is_delayed(delay_secs: i32) -> bool {
    delay_secs > DELAY_THRESHOLD_SECS
}

/// Delay rounded to whole minutes for display
pub fn delay_minutes(delay_secs: i32) -> i64 {
    (i64::from(delay_secs) * 1000 + MINUTE_MS / 2).div_euclid(MINUTE_MS)
}
