//! WHERE conditions built from the periods a sub-select returns

use crate::types::PeriodCondition;
use crate::utils::error::ReportError;
use crate::utils::sql::{Dialect, Expr};
use once_cell::sync::Lazy;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::RwLock;

/// `period_column LIKE 'p1' OR period_column LIKE 'p2' ...`, or the
/// always-false `1=0` when there are no periods
pub fn build_in_condition(
    period_column: &str,
    periods: &[String],
    dialect: &dyn Dialect,
) -> String {
    Expr::any(
        periods
            .iter()
            .map(|period| Expr::raw(period_column).like(period.as_str()))
            .collect(),
    )
    .render(dialect)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    database: String,
    select: String,
}

/// Memoized sub-select results, keyed by database file and select text.
///
/// Only successful results are stored. Connections without a backing file
/// (in-memory databases) are never cached since their path does not
/// identify their contents.
#[derive(Debug, Default)]
pub struct SelectResultCache {
    entries: RwLock<HashMap<CacheKey, Vec<String>>>,
}

static GLOBAL_CACHE: Lazy<SelectResultCache> = Lazy::new(SelectResultCache::new);

impl SelectResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache, never evicted
    pub fn global() -> &'static SelectResultCache {
        &GLOBAL_CACHE
    }

    fn key(conn: &Connection, select: &str) -> Option<CacheKey> {
        let database = conn.path().filter(|p| !p.is_empty())?;
        Some(CacheKey {
            database: database.to_string(),
            select: select.to_string(),
        })
    }

    fn get(&self, key: &CacheKey) -> Option<Vec<String>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn insert(&self, key: CacheKey, periods: Vec<String>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.entry(key).or_insert(periods);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn period_text(value: Value) -> Option<String> {
    match value {
        Value::Text(s) if !s.is_empty() => Some(s),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        _ => None,
    }
}

/// First column of every row, up to the first NULL or empty value
fn fetch_periods(conn: &Connection, select: &str) -> Result<Vec<String>, ReportError> {
    let mut stmt = conn.prepare(select).map_err(ReportError::SubQuery)?;
    let mut rows = stmt.query([]).map_err(ReportError::SubQuery)?;

    let mut periods = Vec::new();
    while let Some(row) = rows.next().map_err(ReportError::SubQuery)? {
        match period_text(row.get(0).map_err(ReportError::SubQuery)?) {
            Some(period) => periods.push(period),
            None => break,
        }
    }
    Ok(periods)
}

/// Run `select` and match `period_column` against each period it returns.
///
/// A failing sub-select yields [`PeriodCondition::Unusable`]; the caller
/// decides how to proceed without the filter.
pub fn condition_from_select(
    conn: &Connection,
    select: &str,
    period_column: &str,
    dialect: &dyn Dialect,
    cache: Option<&SelectResultCache>,
) -> PeriodCondition {
    let key = cache.and_then(|_| SelectResultCache::key(conn, select));

    let cached = match (cache, &key) {
        (Some(cache), Some(key)) => cache.get(key),
        _ => None,
    };

    let periods = match cached {
        Some(periods) => {
            tracing::debug!(select, "period sub-select served from cache");
            periods
        }
        None => match fetch_periods(conn, select) {
            Ok(periods) => {
                if let (Some(cache), Some(key)) = (cache, key) {
                    cache.insert(key, periods.clone());
                }
                periods
            }
            Err(error) => {
                tracing::warn!(select, error = %error, "period condition unusable");
                return PeriodCondition::Unusable;
            }
        },
    };

    PeriodCondition::Matches(build_in_condition(period_column, &periods, dialect))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::sql::{MySql, Sqlite};

    fn periods(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    const FACTS: &str = "CREATE TABLE facts (created_at TEXT);
        INSERT INTO facts VALUES
            ('2024-01-03 10:00:00'), ('2024-02-10 11:00:00'), ('2024-01-20 09:00:00');";

    fn file_db() -> (tempfile::NamedTempFile, Connection) {
        let file = tempfile::Builder::new().suffix(".db").tempfile().unwrap();
        let conn = Connection::open(file.path()).unwrap();
        conn.execute_batch(FACTS).unwrap();
        (file, conn)
    }

    #[test]
    fn renders_like_disjunction() {
        assert_eq!(
            build_in_condition("period", &periods(&["2024-01", "2024-02"]), &MySql),
            "period LIKE '2024-01' OR period LIKE '2024-02'"
        );
        assert_eq!(
            build_in_condition("period", &periods(&["2024-01"]), &Sqlite),
            "period LIKE '2024-01'"
        );
    }

    #[test]
    fn no_periods_is_always_false() {
        assert_eq!(build_in_condition("period", &[], &MySql), "1=0");
    }

    #[test]
    fn quotes_inside_periods_are_escaped() {
        assert_eq!(
            build_in_condition("p", &periods(&["x' OR '1'='1"]), &MySql),
            "p LIKE 'x'' OR ''1''=''1'"
        );
    }

    #[test]
    fn builds_condition_from_sub_select() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(FACTS).unwrap();

        let condition = condition_from_select(
            &conn,
            "SELECT DISTINCT strftime('%Y-%m', created_at) AS p FROM facts ORDER BY p",
            "period",
            &Sqlite,
            None,
        );
        assert_eq!(
            condition,
            PeriodCondition::Matches("period LIKE '2024-01' OR period LIKE '2024-02'".to_string())
        );
    }

    #[test]
    fn stops_at_first_null_row() {
        let conn = Connection::open_in_memory().unwrap();
        let condition = condition_from_select(
            &conn,
            "SELECT '2024-01' UNION ALL SELECT NULL UNION ALL SELECT '2024-03'",
            "period",
            &Sqlite,
            None,
        );
        assert_eq!(condition.sql(), Some("period LIKE '2024-01'"));
    }

    #[test]
    fn empty_result_is_always_false() {
        let (_file, conn) = file_db();
        let select = "SELECT created_at FROM facts WHERE 0";
        let condition = condition_from_select(&conn, select, "period", &Sqlite, None);
        assert_eq!(condition.sql(), Some("1=0"));
    }

    #[test]
    fn failing_sub_select_is_unusable_and_not_cached() {
        let (_file, conn) = file_db();
        let cache = SelectResultCache::new();
        let select = "SELECT DISTINCT date(created_at) FROM later_table";

        let condition = condition_from_select(&conn, select, "period", &Sqlite, Some(&cache));
        assert_eq!(condition, PeriodCondition::Unusable);
        assert_eq!(condition.sql(), None);
        assert!(cache.is_empty());

        conn.execute_batch(
            "CREATE TABLE later_table (created_at TEXT);
             INSERT INTO later_table VALUES ('2024-05-05 00:00:00');",
        )
        .unwrap();
        let condition = condition_from_select(&conn, select, "period", &Sqlite, Some(&cache));
        assert_eq!(condition.sql(), Some("period LIKE '2024-05-05'"));
    }

    #[test]
    fn cache_reuses_results_for_identical_selects_only() {
        let (_file, conn) = file_db();
        let cache = SelectResultCache::new();
        let by_month = "SELECT DISTINCT strftime('%Y-%m', created_at) AS p FROM facts ORDER BY p";
        let by_day = "SELECT DISTINCT date(created_at) AS p FROM facts ORDER BY p";

        let first = condition_from_select(&conn, by_month, "period", &Sqlite, Some(&cache));
        conn.execute("INSERT INTO facts VALUES ('2024-03-01 00:00:00')", []).unwrap();
        let second = condition_from_select(&conn, by_month, "period", &Sqlite, Some(&cache));
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);

        let daily = condition_from_select(&conn, by_day, "period", &Sqlite, Some(&cache));
        assert_eq!(daily.sql().unwrap().matches("LIKE").count(), 4);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn in_memory_connections_bypass_cache() {
        let cache = SelectResultCache::new();
        let conn = Connection::open_in_memory().unwrap();
        let condition =
            condition_from_select(&conn, "SELECT '2024-01'", "period", &Sqlite, Some(&cache));
        assert!(condition.is_usable());
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_is_safe_under_concurrent_use() {
        let (file, _conn) = file_db();
        let path = file.path();
        let cache = SelectResultCache::new();
        let select = "SELECT DISTINCT strftime('%Y-%m', created_at) AS p FROM facts ORDER BY p";
        let expected =
            PeriodCondition::Matches("period LIKE '2024-01' OR period LIKE '2024-02'".to_string());

        let lookup = |conn: &Connection| {
            condition_from_select(conn, select, "period", &Sqlite, Some(&cache))
        };

        let results: Vec<PeriodCondition> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        let conn = Connection::open(path).unwrap();
                        (0..20).map(|_| lookup(&conn)).collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.len(), 160);
        assert!(results.iter().all(|condition| *condition == expected));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn global_cache_is_shared() {
        assert!(std::ptr::eq(SelectResultCache::global(), SelectResultCache::global()));
    }
}
