//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Summaries go to stdout and respect the quiet flag. When `--json` is
//! enabled, output is machine-readable JSON and is printed even in quiet
//! mode, since a caller asked for it explicitly.

use std::fmt::Display;

use serde::Serialize;

use crate::driver::SyncReport;
use crate::sync::SyncResult;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Format one result as a table row.
pub fn format_result(result: &SyncResult, name_width: usize) -> String {
    let detail = match (&result.head_commit, &result.error) {
        (_, Some(failure)) => format!("{}: {}", failure.kind, failure.message),
        (Some(head), None) => head.short(12).to_string(),
        (None, None) => String::new(),
    };
    format!(
        "{:<width$}  {:<9}  {}",
        result.name,
        result.outcome.to_string(),
        detail,
        width = name_width
    )
}

/// Format a run report: one row per repository, then a summary line.
pub fn format_report(report: &SyncReport) -> String {
    let name_width = report
        .results
        .iter()
        .map(|r| r.name.len())
        .chain(report.skipped.iter().map(String::len))
        .max()
        .unwrap_or(0);

    let mut lines: Vec<String> = report
        .results
        .iter()
        .map(|r| format_result(r, name_width))
        .collect();
    lines.extend(
        report
            .skipped
            .iter()
            .map(|name| format!("{:<width$}  {:<9}", name, "skipped", width = name_width)),
    );
    lines.push(report.summary_line());
    lines.join("\n")
}

/// Format a list of items.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}
