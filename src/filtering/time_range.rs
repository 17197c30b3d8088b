use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error_handling::types::FilterError;
use crate::records::field_serde::parse_timestamp;

/// Inclusive `[start, end]` window of UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Which end of a [`TimeRange`] a textual bound describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, FilterError> {
        if start > end {
            return Err(FilterError::EmptyRange(format!("start {} is after end {}", start, end)));
        }
        Ok(Self { start, end })
    }

    /// Builds the window from date/hour/minute pickers.
    ///
    /// The start bound is the first instant of its minute and the end bound
    /// the last, so a reading at 09:30:59.5 falls inside an end of 09:30.
    pub fn from_parts(
        start_date: NaiveDate,
        start_hour: u32,
        start_minute: u32,
        end_date: NaiveDate,
        end_hour: u32,
        end_minute: u32,
    ) -> Result<Self, FilterError> {
        let start = clock(start_hour, start_minute, Bound::Start)?;
        let end = clock(end_hour, end_minute, Bound::End)?;
        Self::new(
            start_date.and_time(start).and_utc(),
            end_date.and_time(end).and_utc(),
        )
    }

    /// Parses optional textual bounds. A missing bound leaves that side open.
    pub fn from_bounds(start: Option<&str>, end: Option<&str>) -> Result<Option<Self>, FilterError> {
        let start = non_blank(start).map(|s| parse_bound(s, Bound::Start)).transpose()?;
        let end = non_blank(end).map(|s| parse_bound(s, Bound::End)).transpose()?;
        match (start, end) {
            (None, None) => Ok(None),
            (start, end) => Self::new(
                start.unwrap_or(DateTime::<Utc>::MIN_UTC),
                end.unwrap_or(DateTime::<Utc>::MAX_UTC),
            )
            .map(Some),
        }
    }

    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        self.start <= *instant && *instant <= self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// First or last instant of the minute `hour:minute`.
fn clock(hour: u32, minute: u32, bound: Bound) -> Result<NaiveTime, FilterError> {
    let time = match bound {
        Bound::Start => NaiveTime::from_hms_opt(hour, minute, 0),
        Bound::End => NaiveTime::from_hms_nano_opt(hour, minute, 59, 999_999_999),
    };
    time.ok_or_else(|| FilterError::BadTime(format!("{:02}:{:02} is not a time of day", hour, minute)))
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Parses one bound of a time filter.
///
/// Accepts RFC 3339, `YYYY-MM-DD[T ]HH:MM[:SS[.f]]` and `YYYY-MM-DD`. A bound
/// without seconds covers its whole minute and a bare date its whole day, up
/// to the last nanosecond on an end bound.
pub fn parse_bound(raw: &str, bound: Bound) -> Result<DateTime<Utc>, FilterError> {
    let raw = raw.trim();
    if let Some(instant) = parse_timestamp(raw) {
        return Ok(instant);
    }
    for layout in ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            let time = clock(naive.hour(), naive.minute(), bound)?;
            return Ok(naive.date().and_time(time).and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let time = match bound {
            Bound::Start => clock(0, 0, bound)?,
            Bound::End => clock(23, 59, bound)?,
        };
        return Ok(date.and_time(time).and_utc());
    }
    Err(FilterError::BadTime(format!("unrecognized time {:?}", raw)))
}
