use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};
use std::time::Duration;

/// Microseconds since the Unix epoch.
///
/// All trade timestamps and polling cursors use this resolution; venue feeds
/// commonly disagree below the millisecond, so microseconds keep ordering
/// stable without guessing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct TimestampMicros(i64);

impl TimestampMicros {
    pub fn from_micros(micros: i64) -> Self {
        TimestampMicros(micros)
    }

    pub fn now() -> Self {
        TimestampMicros(Utc::now().timestamp_micros())
    }

    pub fn micros(&self) -> i64 {
        self.0
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        TimestampMicros(dt.timestamp_micros())
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_micros(self.0).single()
    }
}

impl Add<Duration> for TimestampMicros {
    type Output = TimestampMicros;

    fn add(self, rhs: Duration) -> TimestampMicros {
        TimestampMicros(self.0.saturating_add(rhs.as_micros() as i64))
    }
}

impl Sub<Duration> for TimestampMicros {
    type Output = TimestampMicros;

    fn sub(self, rhs: Duration) -> TimestampMicros {
        TimestampMicros(self.0.saturating_sub(rhs.as_micros() as i64))
    }
}

impl std::fmt::Display for TimestampMicros {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}us", self.0),
        }
    }
}
