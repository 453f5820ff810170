//! Core types for tzreport

use crate::utils::error::ReportError;
use crate::utils::time::format_timestamp;
use serde::{Serialize, Serializer};
use std::fmt;

/// One UTC offset change point of a time zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Seconds since the Unix epoch at which the new offset starts
    pub timestamp: i64,
    /// Offset in effect from `timestamp` onwards
    pub offset_seconds: i32,
    pub is_dst: bool,
}

/// Inclusive time bounds of a report, in seconds since the epoch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeBound {
    pub from: Option<i64>,
    pub to: Option<i64>,
}

/// A window during which one offset was in effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interval {
    #[serde(serialize_with = "serialize_timestamp")]
    pub from: i64,
    #[serde(serialize_with = "serialize_timestamp")]
    pub to: i64,
}

impl Interval {
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.from && timestamp <= self.to
    }
}

fn serialize_timestamp<S: Serializer>(seconds: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(*seconds))
}

/// All windows recorded for a single offset, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OffsetBucket {
    pub offset_seconds: i32,
    pub intervals: Vec<Interval>,
}

/// Offset to interval mapping produced by the transition resolver.
///
/// Buckets keep the order in which their offset was first seen during the
/// backward walk, so the newest offset comes first and the oldest last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntervalSet {
    buckets: Vec<OffsetBucket>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interval to the bucket for `offset_seconds`, creating the
    /// bucket at the end if the offset has not been seen yet
    pub fn record(&mut self, offset_seconds: i32, interval: Interval) {
        match self.buckets.iter_mut().find(|b| b.offset_seconds == offset_seconds) {
            Some(bucket) => bucket.intervals.push(interval),
            None => self.buckets.push(OffsetBucket {
                offset_seconds,
                intervals: vec![interval],
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of distinct offsets
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn buckets(&self) -> &[OffsetBucket] {
        &self.buckets
    }

    pub fn get(&self, offset_seconds: i32) -> Option<&OffsetBucket> {
        self.buckets.iter().find(|b| b.offset_seconds == offset_seconds)
    }

    /// Offset in effect at `timestamp`, if any interval covers it
    pub fn offset_at(&self, timestamp: i64) -> Option<i32> {
        self.buckets
            .iter()
            .find(|b| b.intervals.iter().any(|i| i.contains(timestamp)))
            .map(|b| b.offset_seconds)
    }

    /// All intervals across every bucket, oldest first
    pub fn chronological(&self) -> Vec<(i32, Interval)> {
        let mut all: Vec<(i32, Interval)> = self
            .buckets
            .iter()
            .flat_map(|b| b.intervals.iter().map(move |i| (b.offset_seconds, *i)))
            .collect();
        all.sort_by_key(|(_, i)| i.from);
        all
    }

    /// Earliest covered instant
    pub fn effective_from(&self) -> Option<i64> {
        self.buckets
            .iter()
            .flat_map(|b| b.intervals.iter())
            .map(|i| i.from)
            .min()
    }
}

/// Outcome of resolving offset intervals.
///
/// Resolution never fails outright; a degraded result carries the reason and
/// behaves like an empty set, meaning no time zone correction.
#[derive(Debug)]
pub enum Resolution {
    Resolved(IntervalSet),
    Degraded(ReportError),
}

impl Resolution {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Resolution::Degraded(_))
    }

    pub fn error(&self) -> Option<&ReportError> {
        match self {
            Resolution::Resolved(_) => None,
            Resolution::Degraded(e) => Some(e),
        }
    }

    pub fn into_intervals(self) -> IntervalSet {
        match self {
            Resolution::Resolved(set) => set,
            Resolution::Degraded(_) => IntervalSet::new(),
        }
    }
}

/// Filter condition built from a period sub-select.
///
/// `Unusable` is returned when the sub-select could not be executed; callers
/// must skip filtering on it instead of substituting any SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodCondition {
    Matches(String),
    Unusable,
}

impl PeriodCondition {
    pub fn sql(&self) -> Option<&str> {
        match self {
            PeriodCondition::Matches(sql) => Some(sql),
            PeriodCondition::Unusable => None,
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, PeriodCondition::Matches(_))
    }
}

impl fmt::Display for PeriodCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodCondition::Matches(sql) => write!(f, "{}", sql),
            PeriodCondition::Unusable => write!(f, "<unusable>"),
        }
    }
}

/// How a report table should be cleared for a date range
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearPlan {
    /// No bounds at all: the table can be truncated
    Truncate,
    /// No bounds, but truncation was not allowed (e.g. inside a transaction)
    DeleteAll,
    /// Delete the rows matching the condition
    DeleteWhere(String),
    /// The range could not be determined, leave the table alone
    Skip,
}

/// Sanity window and limits for the transition walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Transitions whose UTC year is before this are skipped
    pub min_year: i32,
    /// Transitions whose UTC year is after this are skipped
    pub max_year: i32,
    /// Upper bound on transitions inspected by one unbounded walk
    pub max_transitions: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            min_year: 1,
            max_year: 9999,
            max_transitions: 4096,
        }
    }
}

/// CLI output format
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// SQL dialect selectable from the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum DialectKind {
    #[default]
    Mysql,
    Sqlite,
}
