//! Observation times and query windows.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SolarError, SolarResult};

/// A half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window starting at `start` and lasting `seconds`.
    pub fn starting_at(start: DateTime<Utc>, seconds: i64) -> Self {
        Self {
            start,
            end: start + Duration::seconds(seconds),
        }
    }

    pub fn contains(&self, t: &DateTime<Utc>) -> bool {
        t >= &self.start && t < &self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Parse an observation time.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS` (UTC assumed), the same with
/// fractional seconds, `YYYY-MM-DD HH:MM:SS` and a bare date.
pub fn parse_time(s: &str) -> SolarResult<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(SolarError::InvalidTime(s.to_string()))
}
