//! Time zone aware report aggregation helpers
//!
//! Resolves which UTC offset applied to each stored timestamp and turns the
//! result into SQL that shifts and buckets timestamps inside the database.

mod condition;
mod offset;
mod range;
mod transitions;

pub use condition::{build_in_condition, condition_from_select, SelectResultCache};
pub use offset::{build_offset_expression, offset_expr, offset_query, OffsetCase};
pub use range::{plan_clear, DateRangeSelect, Filter, Side};
pub use transitions::{resolve_for_range, resolve_offset_intervals, TransitionSource, Tzdb};

use crate::types::ResolverOptions;

/// Where transitions come from and how the walk over them is bounded
pub struct ZoneContext<'a> {
    pub source: &'a dyn TransitionSource,
    pub zone: &'a str,
    pub options: ResolverOptions,
}

impl<'a> ZoneContext<'a> {
    pub fn new(source: &'a dyn TransitionSource, zone: &'a str) -> Self {
        Self {
            source,
            zone,
            options: ResolverOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }
}
