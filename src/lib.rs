//! Time zone aware SQL helpers for report aggregation
//!
//! Given a time zone and a date range, [`report::resolve_offset_intervals`]
//! works out which UTC offset applied when, and
//! [`report::build_offset_expression`] turns that into a single SQL
//! expression that shifts stored UTC timestamps to local time before they
//! are grouped by day or month.

pub mod report;
pub mod types;
pub mod utils;
