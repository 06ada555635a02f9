//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Process / Fetch
//!
//! One block per job as it finishes, then a summary:
//!
//! ```text
//! 001 poster.jpg → thumbs/poster.jpg
//!     500x400 landscape, trimmed, background #ffffff
//!     Text: LA TRAVIATA
//! 002 icon.png → thumbs/icon.jpg
//!     32x32 square, small, background #000000
//! 003 missing.png failed
//!     Reason: image could not be downloaded or decoded
//!
//! Processed 1, small 1, failed 1
//! Cache: 1 cached, 1 computed (2 total)
//! ```
//!
//! ## Inspect
//!
//! ```text
//! 1200x900 landscape
//!     Corners: #ffffff #ffffff #ffffff #101010
//!     Background: #ffffff
//!     Trim: 1100x800, background #ffffff, 200000 px removed
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::cache::{CacheStats, url_name};
use crate::process::{ImageRecord, Inspection, JobOutcome, ProcessReport};

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn dims(dimensions: (u32, u32)) -> String {
    format!("{}x{}", dimensions.0, dimensions.1)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_text(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

// ============================================================================
// Process output
// ============================================================================

/// Format one finished job. `index` is its 1-based completion position.
pub fn format_outcome(index: usize, outcome: &JobOutcome) -> Vec<String> {
    let name = url_name(outcome.url());
    match outcome {
        JobOutcome::Processed(record) => format_record(index, &name, record, false),
        JobOutcome::Small(record) => format_record(index, &name, record, true),
        JobOutcome::Failed { reason, .. } => vec![
            format!("{} {} failed", format_index(index), name),
            format!("{}Reason: {}", indent(1), reason),
        ],
    }
}

fn format_record(index: usize, name: &str, record: &ImageRecord, small: bool) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {} → {}",
        format_index(index),
        name,
        record.output
    )];

    let mut detail = format!(
        "{}{} {}",
        indent(1),
        dims(record.dimensions),
        record.orientation.as_str()
    );
    if small {
        detail.push_str(", small");
    } else if record.trimmed {
        detail.push_str(", trimmed");
    }
    if let Some(bg) = &record.background {
        detail.push_str(&format!(", background {bg}"));
    }
    lines.push(detail);

    if let Some(url) = &record.display_url
        && url != &record.output
    {
        lines.push(format!("{}URL: {}", indent(1), url));
    }
    if let Some(text) = &record.text {
        lines.push(format!("{}Text: {}", indent(1), truncate_text(text, 60)));
    }
    lines
}

/// Summary lines after a batch.
pub fn format_summary(report: &ProcessReport, cache: Option<&CacheStats>) -> Vec<String> {
    let mut lines = vec![format!(
        "Processed {}, small {}, failed {}",
        report.processed, report.small, report.failed
    )];
    if let Some(stats) = cache {
        lines.push(format!("Cache: {}", stats));
    }
    lines
}

pub fn print_summary(report: &ProcessReport, cache: Option<&CacheStats>) {
    for line in format_summary(report, cache) {
        println!("{}", line);
    }
}

// ============================================================================
// Inspect output
// ============================================================================

pub fn format_inspection(info: &Inspection) -> Vec<String> {
    let corners: Vec<String> = info.corners.iter().map(|c| c.hex()).collect();

    let mut lines = vec![
        format!("{} {}", dims(info.dimensions), info.orientation.as_str()),
        format!("{}Corners: {}", indent(1), corners.join(" ")),
    ];
    if let Some(bg) = info.background {
        lines.push(format!("{}Background: {}", indent(1), bg.hex()));
    }
    match &info.trim {
        Some(trim) => lines.push(format!(
            "{}Trim: {}, background {}, {} px removed",
            indent(1),
            dims(trim.dimensions),
            trim.background.hex(),
            trim.removed_area
        )),
        None => lines.push(format!("{}Trim: nothing to remove", indent(1))),
    }
    lines
}

pub fn print_inspection(info: &Inspection) {
    for line in format_inspection(info) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
