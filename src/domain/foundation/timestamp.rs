//! UTC instants.
//!
//! Every lifecycle deadline (trial end, period end, dunning retry, pause
//! resume) is a `Timestamp`. Policy code compares and offsets them; only the
//! adapters look at the `chrono` value underneath.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Provider payloads carry Unix seconds. `None` when out of range.
    pub fn from_unix_secs(secs: i64) -> Option<Self> {
        Utc.timestamp_opt(secs, 0).single().map(Self)
    }

    pub fn as_unix_secs(&self) -> i64 {
        self.0.timestamp()
    }

    pub fn is_before(&self, other: &Timestamp) -> bool {
        self < other
    }

    pub fn is_after(&self, other: &Timestamp) -> bool {
        self > other
    }

    /// Signed gap from `earlier` to `self`.
    pub fn duration_since(&self, earlier: &Timestamp) -> Duration {
        self.0.signed_duration_since(earlier.0)
    }

    pub fn plus(&self, offset: Duration) -> Self {
        *self + offset
    }

    /// Whole calendar-free days; negative moves backwards.
    pub fn add_days(&self, days: i64) -> Self {
        *self + Duration::days(days)
    }

    pub fn minus_days(&self, days: i64) -> Self {
        *self - Duration::days(days)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, offset: Duration) -> Timestamp {
        Timestamp(self.0 + offset)
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, offset: Duration) -> Timestamp {
        Timestamp(self.0 - offset)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339())
    }
}
