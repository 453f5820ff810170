//! Minimal stderr subscriber for `tracing` events
//!
//! Filters come from `RUST_LOG` as a comma separated list of `level`,
//! `target` or `target=level` entries. Without `RUST_LOG` nothing is printed
//! unless verbose output was requested.

use std::env;
use std::fmt::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::field::Visit;
use tracing::{Id, Level, Metadata, Subscriber};
use tracing_core::span::{Attributes, Record};
use tracing_core::{Event, Field};

struct FieldVisitor<'a> {
    out: &'a mut String,
}

impl Visit for FieldVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.out, "{:?} ", value);
        } else {
            let _ = write!(self.out, "{} = {:?}; ", field.name(), value);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LogFilter {
    target: Option<String>,
    level: Option<Level>,
}

impl LogFilter {
    fn matches(&self, metadata: &Metadata<'_>) -> bool {
        if let Some(level) = self.level {
            // more verbose levels compare greater
            if *metadata.level() > level {
                return false;
            }
        }
        if let Some(target) = &self.target {
            if !metadata.target().starts_with(target.as_str()) {
                return false;
            }
        }
        true
    }
}

fn parse_level(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

fn parse_filters(directives: &str) -> Vec<LogFilter> {
    directives.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((target, level)) => LogFilter {
                target: Some(target.to_string()),
                level: parse_level(level),
            },
            None => match parse_level(entry) {
                Some(level) => LogFilter { target: None, level: Some(level) },
                None => LogFilter { target: Some(entry.to_string()), level: None },
            },
        })
        .collect()
}

pub struct StderrLogger {
    enabled: bool,
    filters: Vec<LogFilter>,
}

static NEXT_SPAN_ID: AtomicU64 = AtomicU64::new(1);

impl StderrLogger {
    fn from_env(verbose: bool) -> Self {
        match env::var("RUST_LOG") {
            Ok(directives) => Self {
                enabled: true,
                filters: parse_filters(&directives),
            },
            Err(_) => Self {
                enabled: verbose,
                filters: Vec::new(),
            },
        }
    }

    /// Install as the global default subscriber
    pub fn install(verbose: bool) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
        tracing::subscriber::set_global_default(Self::from_env(verbose))
    }
}

impl Subscriber for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.enabled
            && (self.filters.is_empty() || self.filters.iter().any(|f| f.matches(metadata)))
    }

    fn new_span(&self, _span: &Attributes<'_>) -> Id {
        Id::from_u64(NEXT_SPAN_ID.fetch_add(1, Ordering::Relaxed))
    }

    fn record(&self, _span: &Id, _values: &Record<'_>) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, event: &Event<'_>) {
        let metadata = event.metadata();
        let mut text = String::new();
        event.record(&mut FieldVisitor { out: &mut text });
        eprintln!("{} {}: {}", metadata.level(), metadata.target(), text.trim_end());
    }

    fn enter(&self, _span: &Id) {}

    fn exit(&self, _span: &Id) {}
}
