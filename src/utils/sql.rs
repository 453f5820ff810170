//! SQL dialects and a small expression tree rendered through them
//!
//! Expressions are assembled as [`Expr`] values and only turned into text by
//! [`Expr::render`], so identifiers and literals are always quoted by the
//! dialect rather than spliced into templates.

use crate::types::DialectKind;
use crate::utils::time::format_timestamp;

/// Database-specific SQL primitives
pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Quote a possibly dotted identifier (`alias.column`), segment by segment
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal
    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Native datetime literal for a UTC timestamp
    fn date_literal(&self, seconds: i64) -> String {
        self.quote_literal(&format_timestamp(seconds))
    }

    /// `expr` shifted by a signed number of seconds
    fn date_add_seconds(&self, expr: &str, seconds: i32) -> String;

    /// `expr` truncated to its calendar day
    fn date_part(&self, expr: &str) -> String;
}

fn quote_segments(ident: &str, quote: char) -> String {
    ident
        .split('.')
        .map(|part| {
            let escaped = part.replace(quote, &format!("{quote}{quote}"));
            format!("{quote}{escaped}{quote}")
        })
        .collect::<Vec<_>>()
        .join(".")
}

pub struct MySql;

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        quote_segments(ident, '`')
    }

    fn date_add_seconds(&self, expr: &str, seconds: i32) -> String {
        format!("DATE_ADD({}, INTERVAL {} SECOND)", expr, seconds)
    }

    fn date_part(&self, expr: &str) -> String {
        format!("DATE({})", expr)
    }
}

pub struct Sqlite;

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        quote_segments(ident, '"')
    }

    fn date_add_seconds(&self, expr: &str, seconds: i32) -> String {
        format!("datetime({}, '{:+} seconds')", expr, seconds)
    }

    fn date_part(&self, expr: &str) -> String {
        format!("date({})", expr)
    }
}

pub fn dialect_for(kind: DialectKind) -> &'static dyn Dialect {
    match kind {
        DialectKind::Mysql => &MySql,
        DialectKind::Sqlite => &Sqlite,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }
}

/// SQL scalar expression or predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Already-quoted SQL supplied by the caller, emitted verbatim
    Raw(String),
    /// Identifier quoted by the dialect
    Column(String),
    DateLiteral(i64),
    Text(String),
    DateAdd { expr: Box<Expr>, seconds: i32 },
    DatePart(Box<Expr>),
    Min(Box<Expr>),
    Between { expr: Box<Expr>, low: Box<Expr>, high: Box<Expr> },
    Compare { expr: Box<Expr>, op: CompareOp, value: Box<Expr> },
    Like { expr: Box<Expr>, pattern: String },
    Or(Vec<Expr>),
    And(Vec<Expr>),
    Case { when: Box<Expr>, then: Box<Expr>, otherwise: Box<Expr> },
    /// Always-false predicate
    False,
}

impl Expr {
    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    pub fn column(ident: impl Into<String>) -> Self {
        Expr::Column(ident.into())
    }

    pub fn date_add(self, seconds: i32) -> Self {
        Expr::DateAdd {
            expr: Box::new(self),
            seconds,
        }
    }

    pub fn date_part(self) -> Self {
        Expr::DatePart(Box::new(self))
    }

    pub fn min(self) -> Self {
        Expr::Min(Box::new(self))
    }

    pub fn between(self, low: Expr, high: Expr) -> Self {
        Expr::Between {
            expr: Box::new(self),
            low: Box::new(low),
            high: Box::new(high),
        }
    }

    pub fn compare(self, op: CompareOp, value: Expr) -> Self {
        Expr::Compare {
            expr: Box::new(self),
            op,
            value: Box::new(value),
        }
    }

    pub fn like(self, pattern: impl Into<String>) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: pattern.into(),
        }
    }

    pub fn case(when: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::Case {
            when: Box::new(when),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// Disjunction; an empty list is the always-false predicate
    pub fn any(mut terms: Vec<Expr>) -> Self {
        match terms.len() {
            0 => Expr::False,
            1 => terms.remove(0),
            _ => Expr::Or(terms),
        }
    }

    pub fn render(&self, dialect: &dyn Dialect) -> String {
        match self {
            Expr::Raw(sql) => sql.clone(),
            Expr::Column(ident) => dialect.quote_identifier(ident),
            Expr::DateLiteral(seconds) => dialect.date_literal(*seconds),
            Expr::Text(value) => dialect.quote_literal(value),
            Expr::DateAdd { expr, seconds } => {
                dialect.date_add_seconds(&expr.render(dialect), *seconds)
            }
            Expr::DatePart(expr) => dialect.date_part(&expr.render(dialect)),
            Expr::Min(expr) => format!("MIN({})", expr.render(dialect)),
            Expr::Between { expr, low, high } => format!(
                "({} BETWEEN {} AND {})",
                expr.render(dialect),
                low.render(dialect),
                high.render(dialect)
            ),
            Expr::Compare { expr, op, value } => {
                format!("{} {} {}", expr.render(dialect), op.as_sql(), value.render(dialect))
            }
            Expr::Like { expr, pattern } => {
                format!("{} LIKE {}", expr.render(dialect), dialect.quote_literal(pattern))
            }
            Expr::Or(terms) => terms
                .iter()
                .map(|t| t.render(dialect))
                .collect::<Vec<_>>()
                .join(" OR "),
            Expr::And(terms) => terms
                .iter()
                .map(|t| match t {
                    Expr::Or(_) => format!("({})", t.render(dialect)),
                    _ => t.render(dialect),
                })
                .collect::<Vec<_>>()
                .join(" AND "),
            Expr::Case { when, then, otherwise } => format!(
                "CASE WHEN {} THEN {} ELSE {} END",
                when.render(dialect),
                then.render(dialect),
                otherwise.render(dialect)
            ),
            Expr::False => "1=0".to_string(),
        }
    }
}
