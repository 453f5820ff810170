//! Offset interval resolution from a time zone's transition history

use super::ZoneContext;
use crate::types::{Interval, IntervalSet, Resolution, ResolverOptions, Transition};
use crate::utils::error::ReportError;
use crate::utils::time::{now, parse_bound, utc_year};
use jiff::tz::TimeZone;
use jiff::Timestamp;

/// Supplier of historical UTC offset changes
pub trait TransitionSource: Send + Sync {
    /// Transitions at or before `until`, newest first, at most `limit` of
    /// them when a limit is given
    fn transitions_until(
        &self,
        zone: &str,
        until: i64,
        limit: Option<usize>,
    ) -> Result<Vec<Transition>, ReportError>;
}

/// Transitions from the IANA database bundled with jiff
pub struct Tzdb;

impl TransitionSource for Tzdb {
    fn transitions_until(
        &self,
        zone: &str,
        until: i64,
        limit: Option<usize>,
    ) -> Result<Vec<Transition>, ReportError> {
        let tz = TimeZone::get(zone).map_err(|e| ReportError::timezone(zone, e))?;
        // `preceding` is exclusive
        let start = Timestamp::from_second(until.saturating_add(1))
            .map_err(|_| ReportError::date_parse(&until.to_string()))?;

        Ok(tz
            .preceding(start)
            .take(limit.unwrap_or(usize::MAX))
            .map(|t| Transition {
                timestamp: t.timestamp().as_second(),
                offset_seconds: t.offset().seconds(),
                is_dst: t.dst().is_dst(),
            })
            .collect())
    }
}

fn within_sanity_window(
    transition: &Transition,
    boundary: i64,
    options: &ResolverOptions,
) -> bool {
    if transition.timestamp > boundary {
        return false;
    }
    match utc_year(transition.timestamp) {
        Some(year) => year >= options.min_year && year <= options.max_year,
        None => false,
    }
}

fn walk(ctx: &ZoneContext<'_>, from: Option<i64>, to: i64) -> Result<IntervalSet, ReportError> {
    // A bounded walk must always get past `from`
    let limit = from.is_none().then_some(ctx.options.max_transitions);
    let transitions = ctx.source.transitions_until(ctx.zone, to, limit)?;

    let mut set = IntervalSet::new();
    let mut boundary = to;

    for transition in transitions {
        if !within_sanity_window(&transition, boundary, &ctx.options) {
            tracing::debug!(
                zone = ctx.zone,
                timestamp = transition.timestamp,
                "skipping transition"
            );
            continue;
        }

        set.record(
            transition.offset_seconds,
            Interval {
                from: transition.timestamp,
                to: boundary,
            },
        );
        boundary = transition.timestamp;

        // The interval straddling `from` is kept whole
        if from.is_some_and(|from| transition.timestamp < from) {
            break;
        }
    }

    Ok(set)
}

fn degrade(zone: &str, error: ReportError) -> Resolution {
    tracing::error!(zone, error = %error, "time zone correction disabled");
    Resolution::Degraded(error)
}

/// Resolve, per offset, the windows during which it applied within
/// `[from, to]`.
///
/// Walks transitions backwards from `to`. With a `from` bound the walk stops
/// right after the first transition older than it, so the earliest interval
/// may begin before `from`, and `max_transitions` does not apply. Without one
/// it continues until the history (or `max_transitions`) runs out. Errors are
/// logged and produce a degraded, empty result.
pub fn resolve_offset_intervals(
    ctx: &ZoneContext<'_>,
    from: Option<i64>,
    to: i64,
) -> Resolution {
    match walk(ctx, from, to) {
        Ok(set) => Resolution::Resolved(set),
        Err(error) => degrade(ctx.zone, error),
    }
}

/// Like [`resolve_offset_intervals`] but with textual bounds; a missing `to`
/// means now
pub fn resolve_for_range(
    ctx: &ZoneContext<'_>,
    from: Option<&str>,
    to: Option<&str>,
) -> Resolution {
    match parse_bound(from, to) {
        Ok(bound) => resolve_offset_intervals(ctx, bound.from, bound.to.unwrap_or_else(now)),
        Err(error) => degrade(ctx.zone, error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::parse_timestamp;

    const EST: i32 = -18000;
    const EDT: i32 = -14400;

    /// Fixed transition list, returned newest first
    struct Scripted(Vec<Transition>);

    impl TransitionSource for Scripted {
        fn transitions_until(
            &self,
            _zone: &str,
            until: i64,
            limit: Option<usize>,
        ) -> Result<Vec<Transition>, ReportError> {
            let mut out: Vec<Transition> =
                self.0.iter().copied().filter(|t| t.timestamp <= until).collect();
            out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            if let Some(limit) = limit {
                out.truncate(limit);
            }
            Ok(out)
        }
    }

    struct Broken;

    impl TransitionSource for Broken {
        fn transitions_until(
            &self,
            zone: &str,
            _until: i64,
            _limit: Option<usize>,
        ) -> Result<Vec<Transition>, ReportError> {
            Err(ReportError::timezone(zone, "corrupt transition table"))
        }
    }

    fn tr(timestamp: i64, offset_seconds: i32) -> Transition {
        Transition {
            timestamp,
            offset_seconds,
            is_dst: offset_seconds == EDT,
        }
    }

    /// `count` transitions 100s apart, alternating EST and EDT
    fn alternating(count: i64) -> Scripted {
        Scripted(
            (1..=count)
                .map(|i| tr(i * 100, if i % 2 == 0 { EDT } else { EST }))
                .collect(),
        )
    }

    fn ts(s: &str) -> i64 {
        parse_timestamp(s).unwrap()
    }

    fn assert_partitions(set: &IntervalSet, from: i64, to: i64) {
        let all = set.chronological();
        assert!(!all.is_empty());
        assert!(all[0].1.from <= from, "first interval must reach back to {from}");
        assert_eq!(all.last().unwrap().1.to, to);
        for pair in all.windows(2) {
            assert_eq!(
                pair[0].1.to,
                pair[1].1.from,
                "gap or overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn new_york_2023_has_standard_and_daylight_buckets() {
        let ctx = ZoneContext::new(&Tzdb, "America/New_York");
        let (from, to) = (ts("2023-01-01"), ts("2023-12-31"));
        let set = resolve_offset_intervals(&ctx, Some(from), to).into_intervals();

        let offsets: Vec<i32> = set.buckets().iter().map(|b| b.offset_seconds).collect();
        assert_eq!(offsets, vec![EST, EDT]);

        assert_eq!(
            set.get(EST).unwrap().intervals,
            vec![
                Interval { from: ts("2023-11-05 06:00:00"), to },
                Interval { from: ts("2022-11-06 06:00:00"), to: ts("2023-03-12 07:00:00") },
            ]
        );
        assert_eq!(
            set.get(EDT).unwrap().intervals,
            vec![Interval { from: ts("2023-03-12 07:00:00"), to: ts("2023-11-05 06:00:00") }]
        );
        assert_partitions(&set, from, to);
    }

    #[test]
    fn fixed_offset_zone_resolves_to_nothing() {
        for zone in ["UTC", "Etc/UTC"] {
            let ctx = ZoneContext::new(&Tzdb, zone);
            let resolution = resolve_for_range(&ctx, Some("2023-01-01"), Some("2023-12-31"));
            assert!(!resolution.is_degraded());
            assert!(resolution.into_intervals().is_empty());
        }
    }

    #[test]
    fn zone_without_recent_changes_keeps_its_last_offset() {
        let ctx = ZoneContext::new(&Tzdb, "America/Phoenix");
        let from = ts("2023-01-01");
        let set = resolve_for_range(&ctx, Some("2023-01-01"), Some("2023-12-31")).into_intervals();
        assert_eq!(set.len(), 1);
        assert_eq!(set.buckets()[0].offset_seconds, -25200);
        assert!(set.effective_from().unwrap() < from);
    }

    #[test]
    fn resolution_is_idempotent() {
        let ctx = ZoneContext::new(&Tzdb, "Europe/Berlin");
        let bounds = (Some("2020-01-01"), Some("2024-06-30"));
        let first = resolve_for_range(&ctx, bounds.0, bounds.1).into_intervals();
        let second = resolve_for_range(&ctx, bounds.0, bounds.1).into_intervals();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_partitions(&first, ts("2020-01-01"), ts("2024-06-30"));
    }

    #[test]
    fn unknown_zone_degrades() {
        let ctx = ZoneContext::new(&Tzdb, "Mars/Olympus_Mons");
        let resolution = resolve_for_range(&ctx, None, Some("2023-12-31"));
        assert!(matches!(resolution.error(), Some(ReportError::TimezoneData { .. })));
        assert!(resolution.into_intervals().is_empty());
    }

    #[test]
    fn unparseable_bound_degrades() {
        let ctx = ZoneContext::new(&Tzdb, "America/New_York");
        let resolution = resolve_for_range(&ctx, Some("first of never"), Some("2023-12-31"));
        assert!(matches!(resolution.error(), Some(ReportError::DateParse { .. })));
        assert!(resolution.into_intervals().is_empty());
    }

    #[test]
    fn source_failure_degrades() {
        let ctx = ZoneContext::new(&Broken, "America/New_York");
        let resolution = resolve_offset_intervals(&ctx, None, 1_000);
        assert!(resolution.is_degraded());
    }

    #[test]
    fn stops_one_transition_below_from() {
        let source = Scripted(vec![tr(100, EST), tr(200, EDT), tr(300, EST), tr(400, EDT)]);
        let ctx = ZoneContext::new(&source, "Test/Zone");
        let set = resolve_offset_intervals(&ctx, Some(250), 500).into_intervals();

        assert_eq!(
            set.get(EDT).unwrap().intervals,
            vec![Interval { from: 400, to: 500 }, Interval { from: 200, to: 300 }]
        );
        assert_eq!(set.get(EST).unwrap().intervals, vec![Interval { from: 300, to: 400 }]);
        assert_eq!(set.offset_at(150), None);
        assert_eq!(set.effective_from(), Some(200));
        assert_partitions(&set, 250, 500);
    }

    #[test]
    fn unbounded_walk_runs_to_the_oldest_transition() {
        let source = Scripted(vec![tr(100, EST), tr(200, EDT), tr(300, EST)]);
        let ctx = ZoneContext::new(&source, "Test/Zone");
        let set = resolve_offset_intervals(&ctx, None, 500).into_intervals();
        assert_eq!(set.effective_from(), Some(100));
        assert_partitions(&set, 100, 500);
    }

    #[test]
    fn invalid_transitions_are_skipped_not_fatal() {
        let ancient = ts("1900-06-01");
        let source = Scripted(vec![tr(ancient, EST), tr(200, EDT), tr(300, EST)]);
        let options = ResolverOptions {
            min_year: 1970,
            ..ResolverOptions::default()
        };
        let ctx = ZoneContext::new(&source, "Test/Zone").with_options(options);
        let set = resolve_offset_intervals(&ctx, None, 500).into_intervals();

        assert_eq!(set.effective_from(), Some(200));
        assert_eq!(set.offset_at(ancient), None);
        assert_eq!(set.offset_at(250), Some(EDT));
    }

    #[test]
    fn transition_limit_bounds_the_walk() {
        let source = alternating(50);
        let options = ResolverOptions {
            max_transitions: 3,
            ..ResolverOptions::default()
        };
        let ctx = ZoneContext::new(&source, "Test/Zone").with_options(options);
        let set = resolve_offset_intervals(&ctx, None, 10_000).into_intervals();
        assert_eq!(set.chronological().len(), 3);
        assert_eq!(set.effective_from(), Some(4800));
    }

    #[test]
    fn transition_limit_does_not_cut_a_bounded_walk_short() {
        let source = alternating(50);
        let options = ResolverOptions {
            max_transitions: 3,
            ..ResolverOptions::default()
        };
        let ctx = ZoneContext::new(&source, "Test/Zone").with_options(options);
        let set = resolve_offset_intervals(&ctx, Some(1_050), 10_000).into_intervals();

        assert_eq!(set.effective_from(), Some(1_000));
        assert_eq!(set.chronological().len(), 41);
        assert_partitions(&set, 1_050, 10_000);
    }

    #[test]
    fn far_future_upper_bound_still_reaches_from() {
        let options = ResolverOptions {
            max_transitions: 3,
            ..ResolverOptions::default()
        };
        let ctx = ZoneContext::new(&Tzdb, "America/New_York").with_options(options);
        let from = ts("2023-01-01");
        let set = resolve_for_range(&ctx, Some("2023-01-01"), Some("2100-01-01")).into_intervals();

        assert!(set.effective_from().unwrap() <= from);
        assert_partitions(&set, from, ts("2100-01-01"));
    }
}
