//! tzreport - time zone corrected SQL for report aggregation

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tzreport::report::{
    build_offset_expression, condition_from_select, resolve_for_range, DateRangeSelect,
    SelectResultCache, Tzdb, ZoneContext,
};
use tzreport::types::{DialectKind, OutputFormat, PeriodCondition, Resolution, ResolverOptions};
use tzreport::utils::db::{table_exists, with_db_snapshot};
use tzreport::utils::format::{format_json, format_summary, format_table, print_banner};
use tzreport::utils::logging::StderrLogger;
use tzreport::utils::sql::{dialect_for, Sqlite};

#[derive(Parser)]
#[command(name = "tzreport")]
#[command(author, version, about = "Build time zone corrected SQL for report aggregation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log diagnostics to stderr (RUST_LOG overrides the filter)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct RangeArgs {
    /// IANA time zone, e.g. America/Los_Angeles
    #[arg(long, default_value = "UTC")]
    tz: String,

    /// Lower bound (UTC), e.g. 2023-01-01 or 2023-01-01T00:00:00Z
    #[arg(long)]
    from: Option<String>,

    /// Upper bound (UTC); defaults to now
    #[arg(long)]
    to: Option<String>,

    /// Ignore transitions before this year
    #[arg(long, default_value_t = 1)]
    min_year: i32,

    /// Ignore transitions after this year
    #[arg(long, default_value_t = 9999)]
    max_year: i32,
}

impl RangeArgs {
    fn options(&self) -> ResolverOptions {
        ResolverOptions {
            min_year: self.min_year,
            max_year: self.max_year,
            ..ResolverOptions::default()
        }
    }

    fn context(&self) -> ZoneContext<'_> {
        ZoneContext::new(&Tzdb, &self.tz).with_options(self.options())
    }

    fn resolve(&self) -> Resolution {
        resolve_for_range(&self.context(), self.from.as_deref(), self.to.as_deref())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show which UTC offset applied during which interval
    Intervals {
        #[command(flatten)]
        range: RangeArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Print the offset corrected expression for a column
    Expr {
        /// Column name, optionally qualified (alias.column)
        #[arg(short, long)]
        column: String,

        #[command(flatten)]
        range: RangeArgs,

        #[arg(long, value_enum, default_value = "mysql")]
        dialect: DialectKind,
    },
    /// Find the local days present in a SQLite table and print the matching condition
    Periods {
        /// SQLite database file
        #[arg(long)]
        db: PathBuf,

        #[arg(long)]
        table: String,

        /// Timestamp column to bucket
        #[arg(long)]
        column: String,

        /// Column the range applies to (defaults to --column)
        #[arg(long)]
        where_column: Option<String>,

        /// Period column of the report table the condition is for
        #[arg(long, default_value = "period")]
        period_column: String,

        #[command(flatten)]
        range: RangeArgs,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    StderrLogger::install(cli.verbose).context("installing logger")?;

    match cli.command {
        Commands::Intervals { range, format } => run_intervals(&range, format),
        Commands::Expr { column, range, dialect } => run_expr(&column, &range, dialect),
        Commands::Periods {
            db,
            table,
            column,
            where_column,
            period_column,
            range,
        } => run_periods(&db, &table, &column, where_column.as_deref(), &period_column, &range),
    }
}

fn run_intervals(range: &RangeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let resolution = range.resolve();

    match format {
        OutputFormat::Table => {
            print_banner();
            println!("{}\n", format_summary(&range.tz, &resolution));
            if let Resolution::Resolved(ref set) = resolution {
                if !set.is_empty() {
                    println!("{}", format_table(set));
                }
            }
        }
        OutputFormat::Json => println!("{}", format_json(&resolution.into_intervals())),
    }

    Ok(())
}

fn run_expr(column: &str, range: &RangeArgs, dialect: DialectKind) -> anyhow::Result<()> {
    let dialect = dialect_for(dialect);
    let intervals = range.resolve().into_intervals();
    let column_ref = dialect.quote_identifier(column);

    println!("{}", build_offset_expression(&column_ref, &intervals, dialect));
    Ok(())
}

fn run_periods(
    db: &Path,
    table: &str,
    column: &str,
    where_column: Option<&str>,
    period_column: &str,
    range: &RangeArgs,
) -> anyhow::Result<()> {
    let condition = with_db_snapshot(db, |conn| {
        if !table_exists(conn, table) {
            anyhow::bail!("Table {:?} not found in {:?}", table, db);
        }

        let select = DateRangeSelect::new(table, column, where_column.unwrap_or(column))
            .between(range.from.as_deref(), range.to.as_deref())
            .build(conn, &Sqlite, &range.context())?;
        tracing::debug!(%select, "period sub-select");

        Ok(condition_from_select(
            conn,
            &select,
            period_column,
            &Sqlite,
            Some(SelectResultCache::global()),
        ))
    })?;

    match condition {
        PeriodCondition::Matches(sql) => println!("{}", sql),
        PeriodCondition::Unusable => {
            eprintln!("{}", "Period sub-select failed; do not filter on this condition.".yellow());
        }
    }

    Ok(())
}
