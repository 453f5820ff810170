//! Date-range sub-selects over report source tables and clear-range planning

use super::offset::offset_query;
use super::ZoneContext;
use crate::types::{ClearPlan, PeriodCondition};
use crate::utils::error::ReportError;
use crate::utils::sql::{CompareOp, Dialect, Expr};
use rusqlite::Connection;

const DEFAULT_ALIAS: &str = "date_range_table";
const DEFAULT_RELATED_ALIAS: &str = "related_date_range_table";

/// Which table of a date-range select a [`Filter`] applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Main,
    Related,
}

/// Extra `column <op> value` restriction on a date-range select
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub side: Side,
    pub column: String,
    pub op: CompareOp,
    pub value: String,
}

impl Filter {
    pub fn new(column: &str, op: CompareOp, value: &str) -> Self {
        Self {
            side: Side::Main,
            column: column.to_string(),
            op,
            value: value.to_string(),
        }
    }

    pub fn on_related(mut self) -> Self {
        self.side = Side::Related;
        self
    }
}

#[derive(Debug, Clone)]
struct RelatedTable {
    table: String,
    alias: String,
    // (main table column, related table column)
    join_on: Vec<(String, String)>,
}

/// `SELECT DISTINCT <day of column>` over a source table, restricted to a
/// date range.
///
/// Without a related table the day is taken after time zone correction and
/// the range applies to the main table's `where_column`. With one, the raw
/// column is used and the range applies to the related table.
#[derive(Debug, Clone)]
pub struct DateRangeSelect {
    table: String,
    alias: String,
    column: String,
    where_column: String,
    from: Option<String>,
    to: Option<String>,
    filters: Vec<Filter>,
    related: Option<RelatedTable>,
}

impl DateRangeSelect {
    pub fn new(table: &str, column: &str, where_column: &str) -> Self {
        Self {
            table: table.to_string(),
            alias: DEFAULT_ALIAS.to_string(),
            column: column.to_string(),
            where_column: where_column.to_string(),
            from: None,
            to: None,
            filters: Vec::new(),
            related: None,
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = alias.to_string();
        self
    }

    pub fn between(mut self, from: Option<&str>, to: Option<&str>) -> Self {
        self.from = from.map(str::to_string);
        self.to = to.map(str::to_string);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Inner join `table`, matching each `(main column, related column)` pair
    pub fn join_related(mut self, table: &str, join_on: &[(&str, &str)]) -> Self {
        self.related = Some(RelatedTable {
            table: table.to_string(),
            alias: DEFAULT_RELATED_ALIAS.to_string(),
            join_on: join_on
                .iter()
                .map(|(main, related)| (main.to_string(), related.to_string()))
                .collect(),
        });
        self
    }

    pub fn related_alias(mut self, alias: &str) -> Self {
        if let Some(related) = self.related.as_mut() {
            related.alias = alias.to_string();
        }
        self
    }

    fn qualified(alias: &str, column: &str) -> Expr {
        Expr::column(format!("{}.{}", alias, column))
    }

    fn side_alias(&self, side: Side) -> Option<&str> {
        match (side, &self.related) {
            (Side::Main, _) => Some(self.alias.as_str()),
            (Side::Related, Some(related)) => Some(related.alias.as_str()),
            (Side::Related, None) => None,
        }
    }

    fn conditions(&self) -> Vec<Expr> {
        let bound_alias = self
            .related
            .as_ref()
            .map(|r| r.alias.as_str())
            .unwrap_or(&self.alias);

        let bound_column = || Self::qualified(bound_alias, &self.where_column);

        let mut conditions = Vec::new();
        if let Some(from) = &self.from {
            conditions.push(bound_column().compare(CompareOp::GtEq, Expr::Text(from.clone())));
        }
        if let Some(to) = &self.to {
            conditions.push(bound_column().compare(CompareOp::LtEq, Expr::Text(to.clone())));
        }

        for filter in &self.filters {
            match self.side_alias(filter.side) {
                Some(alias) => conditions.push(
                    Self::qualified(alias, &filter.column)
                        .compare(filter.op, Expr::Text(filter.value.clone())),
                ),
                None => tracing::debug!(
                    column = %filter.column,
                    "ignoring related filter without a related table"
                ),
            }
        }
        conditions
    }

    /// Render the select. Time zone correction may need to look up the
    /// oldest row when no `from` bound was given, hence the connection.
    pub fn build(
        &self,
        conn: &Connection,
        dialect: &dyn Dialect,
        ctx: &ZoneContext<'_>,
    ) -> Result<String, ReportError> {
        let from_clause = format!(
            "{} AS {}",
            dialect.quote_identifier(&self.table),
            dialect.quote_identifier(&self.alias)
        );
        let column = Self::qualified(&self.alias, &self.column);

        let period = match &self.related {
            Some(_) => column.date_part(),
            None => offset_query(
                conn,
                dialect,
                ctx,
                &from_clause,
                column,
                self.from.as_deref(),
                self.to.as_deref(),
            )?
            .date_part(),
        };

        let mut sql = format!("SELECT DISTINCT {} FROM {}", period.render(dialect), from_clause);

        if let Some(related) = &self.related {
            let on: Vec<Expr> = related
                .join_on
                .iter()
                .map(|(main, other)| {
                    Self::qualified(&self.alias, main)
                        .compare(CompareOp::Eq, Self::qualified(&related.alias, other))
                })
                .collect();
            sql.push_str(&format!(
                " INNER JOIN {} AS {} ON {}",
                dialect.quote_identifier(&related.table),
                dialect.quote_identifier(&related.alias),
                Expr::And(on).render(dialect)
            ));
        }

        let conditions = self.conditions();
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&Expr::And(conditions).render(dialect));
        }

        Ok(sql)
    }
}

/// Decide how to clear a report table for `[from, to]`.
///
/// With no bounds the table may be truncated (unless `allow_truncate` is
/// off, e.g. inside a transaction). A period condition, when given, takes
/// precedence over the bounds; an unusable one means nothing is deleted.
pub fn plan_clear(
    period_column: &str,
    from: Option<&str>,
    to: Option<&str>,
    period_condition: Option<&PeriodCondition>,
    allow_truncate: bool,
    dialect: &dyn Dialect,
) -> ClearPlan {
    if from.is_none() && to.is_none() && allow_truncate {
        return ClearPlan::Truncate;
    }

    if let Some(condition) = period_condition {
        return match condition.sql() {
            Some(sql) => ClearPlan::DeleteWhere(sql.to_string()),
            None => ClearPlan::Skip,
        };
    }

    let mut bounds = Vec::new();
    if let Some(from) = from {
        bounds.push(Expr::raw(period_column).compare(CompareOp::GtEq, Expr::Text(from.into())));
    }
    if let Some(to) = to {
        bounds.push(Expr::raw(period_column).compare(CompareOp::LtEq, Expr::Text(to.into())));
    }

    if bounds.is_empty() {
        ClearPlan::DeleteAll
    } else {
        ClearPlan::DeleteWhere(Expr::And(bounds).render(dialect))
    }
}
