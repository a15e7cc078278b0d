//! Plain-text tables and JSON envelopes for command results.
//!
//! Renderers only build strings; printing happens in `main`.

use crate::cli::{CliError, OkEnvelope};
use pipeprobe_ci::{CleanupMode, CleanupReport, ReconReport, RunSummary};
use serde::Serialize;
use serde_json::json;
use std::fmt::Write as _;

/// Titled ASCII table with one header row.
#[must_use]
pub fn table(title: &str, headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let rule = widths
        .iter()
        .fold(String::from("+"), |mut line, width| {
            line.push_str(&"-".repeat(width + 2));
            line.push('+');
            line
        });
    let mut out = String::new();
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "{}", row_line(headers.iter().copied(), &widths));
    let _ = writeln!(out, "{rule}");
    for row in rows {
        let _ = writeln!(out, "{}", row_line(row.iter().map(String::as_str), &widths));
    }
    let _ = writeln!(out, "{rule}");
    out
}

fn row_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let mut out = String::from("|");
    for (cell, width) in cells.zip(widths) {
        let pad = width.saturating_sub(cell.chars().count());
        let _ = write!(out, " {cell}{} |", " ".repeat(pad));
    }
    out
}

/// Account table followed by the target table.
#[must_use]
pub fn recon_text(report: &ReconReport) -> String {
    let identity = &report.identity;
    let account = vec![
        vec!["Username".to_string(), identity.username.clone()],
        vec![
            "Name".to_string(),
            identity.display_name.clone().unwrap_or_else(|| "-".into()),
        ],
        vec!["ID".to_string(), identity.id.to_string()],
        vec![
            "Email".to_string(),
            identity.email.clone().unwrap_or_else(|| "-".into()),
        ],
        vec!["Is Admin".to_string(), report.is_admin.to_string()],
        vec!["Privilege".to_string(), report.privilege.to_string()],
    ];
    let targets: Vec<Vec<String>> = report
        .targets
        .iter()
        .map(|t| {
            vec![
                t.full_path.clone(),
                t.visibility.to_string(),
                t.access_summary.to_string(),
            ]
        })
        .collect();

    let platform = platform_title(&report.platform);
    let mut out = table(
        &format!("{platform} Token/Account Info"),
        &["Key", "Value"],
        &account,
    );
    out.push('\n');
    out.push_str(&table(
        &format!("Accessible {platform} Projects"),
        &["Project", "Visibility", "Permissions"],
        &targets,
    ));
    out
}

fn platform_title(name: &str) -> &str {
    match name {
        "github" => "GitHub",
        "gitlab" => "GitLab",
        other => other,
    }
}

/// Run header, every collected log entry, then the cleanup outcome.
#[must_use]
pub fn run_text(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Run {} on {} (branch {}): {}",
        summary.run_id, summary.target, summary.branch, summary.status
    );
    let _ = writeln!(out, "Pipeline file: {}", summary.pipeline_path.display());
    if summary.logs.is_empty() {
        let _ = writeln!(out, "No logs were returned for this run.");
    }
    for entry in &summary.logs.entries {
        let _ = writeln!(out, "\n===== {} =====", entry.name);
        out.push_str(&entry.content);
        if !entry.content.ends_with('\n') {
            out.push('\n');
        }
    }
    out.push('\n');
    out.push_str(&cleanup_text(&summary.cleanup));
    out
}

/// One line per cleanup outcome: warnings, deliberately kept and leftover artifacts.
#[must_use]
pub fn cleanup_text(report: &CleanupReport) -> String {
    let mode = match report.mode {
        CleanupMode::Full => "full",
        CleanupMode::LogsOnly => "logs only",
    };
    let mut out = String::new();
    if report.is_clean() && report.remaining.is_empty() {
        let _ = writeln!(out, "Cleanup ({mode}): complete");
        return out;
    }
    let _ = writeln!(out, "Cleanup ({mode}):");
    for warning in &report.warnings {
        let _ = writeln!(out, "  warning: {warning}");
    }
    if !report.retained.is_empty() {
        let _ = writeln!(out, "  kept: {}", join(&report.retained));
    }
    let left: Vec<_> = report
        .remaining
        .iter()
        .filter(|a| !report.retained.contains(a))
        .collect();
    if !left.is_empty() {
        let _ = writeln!(out, "  left behind: {}", join(&left));
    }
    out
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Serialize a result inside an `{"status": "ok", "data": ...}` envelope.
///
/// # Errors
///
/// Returns a platform error if serialization fails.
pub fn json<T: Serialize>(data: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(&OkEnvelope::new(data))
        .map_err(|e| CliError::platform(format!("Failed to serialize result: {e}")))
}

/// Payload of the JSON error envelope.
///
/// Failed runs also carry what cleanup did, so callers can see leftovers.
#[must_use]
pub fn error_details(err: &CliError) -> serde_json::Value {
    match err {
        CliError::Run(failure) => json!({
            "code": err.code(),
            "message": failure.to_string(),
            "cause": failure.error.to_string(),
            "target": failure.target,
            "branch": failure.branch,
            "failed_after": failure.failed_after,
            "run_id": failure.run_id,
            "last_status": failure.last_status,
            "cleanup": failure.cleanup,
        }),
        _ => json!({
            "code": err.code(),
            "message": err.to_string(),
        }),
    }
}
