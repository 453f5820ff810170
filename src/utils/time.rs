//! Time utilities for parsing report bounds and rendering date literals
//!
//! All timestamps are UTC seconds since the epoch; report tables store UTC
//! datetimes in `YYYY-MM-DD HH:MM:SS` form.

use crate::types::TimeBound;
use crate::utils::error::ReportError;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};

/// Datetime layout used for SQL date literals
pub const SQL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FORMATS: [&str; 6] = [
    SQL_DATETIME_FORMAT,
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse a bound given as RFC 3339, `YYYY-MM-DD[ HH:MM[:SS[.fff]]]` (UTC) or
/// raw epoch seconds. Fractional seconds are truncated.
pub fn parse_timestamp(input: &str) -> Result<i64, ReportError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(ReportError::date_parse(input));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt.and_utc().timestamp());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc().timestamp());
        }
    }

    let digits = s.strip_prefix('-').unwrap_or(s);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().map_err(|_| ReportError::date_parse(input));
    }

    Err(ReportError::date_parse(input))
}

/// Parse optional `from`/`to` strings into a [`TimeBound`]
pub fn parse_bound(from: Option<&str>, to: Option<&str>) -> Result<TimeBound, ReportError> {
    Ok(TimeBound {
        from: from.map(parse_timestamp).transpose()?,
        to: to.map(parse_timestamp).transpose()?,
    })
}

/// Render a timestamp as `YYYY-MM-DD HH:MM:SS` in UTC
pub fn format_timestamp(seconds: i64) -> String {
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .map(|dt| dt.format(SQL_DATETIME_FORMAT).to_string())
        .unwrap_or_else(|| seconds.to_string())
}

/// UTC calendar year of a timestamp
pub fn utc_year(seconds: i64) -> Option<i32> {
    DateTime::<Utc>::from_timestamp(seconds, 0).map(|dt| dt.year())
}

pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// Render a UTC offset as `+HH:MM`
pub fn format_offset(offset_seconds: i32) -> String {
    let sign = if offset_seconds < 0 { '-' } else { '+' };
    let abs = offset_seconds.unsigned_abs();
    let (hours, minutes, seconds) = (abs / 3600, (abs % 3600) / 60, abs % 60);
    if seconds == 0 {
        format!("{}{:02}:{:02}", sign, hours, minutes)
    } else {
        format!("{}{:02}:{:02}:{:02}", sign, hours, minutes, seconds)
    }
}
