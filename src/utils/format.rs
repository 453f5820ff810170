//! Output formatting utilities

use crate::types::{IntervalSet, Resolution};
use crate::utils::time::{format_offset, format_timestamp};
use colored::Colorize;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

/// Table row for display
#[derive(Tabled)]
pub struct IntervalRow {
    #[tabled(rename = "Offset")]
    pub offset: String,
    #[tabled(rename = "From (UTC)")]
    pub from: String,
    #[tabled(rename = "To (UTC)")]
    pub to: String,
}

/// Intervals as a table, oldest first
pub fn format_table(intervals: &IntervalSet) -> String {
    let rows: Vec<IntervalRow> = intervals
        .chronological()
        .into_iter()
        .map(|(offset, interval)| IntervalRow {
            offset: format_offset(offset),
            from: format_timestamp(interval.from),
            to: format_timestamp(interval.to),
        })
        .collect();

    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(0)).with(Alignment::right()))
        .to_string()
}

pub fn format_json(intervals: &IntervalSet) -> String {
    serde_json::to_string_pretty(intervals).unwrap_or_else(|_| "{}".to_string())
}

/// One line summary of a resolution
pub fn format_summary(zone: &str, resolution: &Resolution) -> String {
    match resolution {
        Resolution::Degraded(error) => format!("{} {}", "✗".red(), error.to_string().red()),
        Resolution::Resolved(set) if set.is_empty() => {
            format!("{} {} has no offset changes in range", "○".dimmed(), zone.bold())
        }
        Resolution::Resolved(set) => format!(
            "{} {}: {} offsets, {} intervals",
            "✓".green(),
            zone.bold(),
            set.len(),
            set.chronological().len()
        ),
    }
}

/// Print banner
pub fn print_banner() {
    println!();
    println!("{}", "  tzreport - time zone aware report SQL".cyan().bold());
    println!();
}
