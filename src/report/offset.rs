//! Offset correction expressions
//!
//! Turns an [`IntervalSet`] into a right-nested `CASE WHEN` expression that
//! shifts a UTC timestamp column into local time, one branch per offset.

use super::transitions::resolve_for_range;
use super::ZoneContext;
use crate::types::{IntervalSet, OffsetBucket};
use crate::utils::error::ReportError;
use crate::utils::sql::{Dialect, Expr};
use rusqlite::types::Value;
use rusqlite::Connection;

/// Ordered `(predicate, offset)` branches plus the offset of the final
/// `ELSE`, which is the last (oldest) bucket of the set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetCase {
    branches: Vec<(Expr, i32)>,
    fallback: i32,
}

fn bucket_predicate(column: &Expr, bucket: &OffsetBucket) -> Expr {
    Expr::any(
        bucket
            .intervals
            .iter()
            .map(|i| column.clone().between(Expr::DateLiteral(i.from), Expr::DateLiteral(i.to)))
            .collect(),
    )
}

impl OffsetCase {
    /// `None` when there is nothing to correct
    pub fn new(column: &Expr, intervals: &IntervalSet) -> Option<Self> {
        let (last, rest) = intervals.buckets().split_last()?;
        Some(Self {
            branches: rest
                .iter()
                .map(|bucket| (bucket_predicate(column, bucket), bucket.offset_seconds))
                .collect(),
            fallback: last.offset_seconds,
        })
    }

    pub fn branches(&self) -> &[(Expr, i32)] {
        &self.branches
    }

    pub fn fallback(&self) -> i32 {
        self.fallback
    }

    pub fn into_expr(self, column: &Expr) -> Expr {
        self.branches
            .into_iter()
            .rev()
            .fold(column.clone().date_add(self.fallback), |otherwise, (when, offset)| {
                Expr::case(when, column.clone().date_add(offset), otherwise)
            })
    }
}

/// `column` shifted by the applicable offset, or `column` itself when the
/// set is empty
pub fn offset_expr(column: Expr, intervals: &IntervalSet) -> Expr {
    match OffsetCase::new(&column, intervals) {
        Some(case) => case.into_expr(&column),
        None => column,
    }
}

/// Render the offset expression for an already-quoted column reference
pub fn build_offset_expression(
    column_ref: &str,
    intervals: &IntervalSet,
    dialect: &dyn Dialect,
) -> String {
    offset_expr(Expr::raw(column_ref), intervals).render(dialect)
}

/// `MIN()` result as a parseable bound; numbers are taken as epoch seconds
fn value_to_bound(value: Value) -> Option<String> {
    match value {
        Value::Text(s) if !s.is_empty() => Some(s),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) if f.is_finite() => Some((f.trunc() as i64).to_string()),
        other => {
            tracing::debug!(
                value = ?other,
                "oldest value unusable as a bound, walking all history"
            );
            None
        }
    }
}

/// Offset-corrected expression for `column` of the table in `from_clause`.
///
/// When `from` is absent the oldest value of the column is looked up with
/// `MIN()`; an empty table leaves the walk unbounded. Failing to run that
/// lookup is an error, while any failure during resolution only disables
/// the correction.
pub fn offset_query(
    conn: &Connection,
    dialect: &dyn Dialect,
    ctx: &ZoneContext<'_>,
    from_clause: &str,
    column: Expr,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<Expr, ReportError> {
    let oldest;
    let from = match from {
        Some(from) => Some(from),
        None => {
            let min = column.clone().min().render(dialect);
            let sql = format!("SELECT {} FROM {}", min, from_clause);
            let value: Value = conn.query_row(&sql, [], |row| row.get(0))?;
            oldest = value_to_bound(value);
            oldest.as_deref()
        }
    };

    let intervals = resolve_for_range(ctx, from, to).into_intervals();
    Ok(offset_expr(column, &intervals))
}
