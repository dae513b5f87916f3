//! CLI output formatting.
//!
//! Output leads with the input file (positional index + name); the result is
//! shown on indented context lines underneath.
//!
//! # Output Format
//!
//! ## Compress
//!
//! ```text
//! 001 IMG_0042.HEIC → compressed/IMG_0042.webp
//!     1024x768 q70, 812.4 KB (from 3.1 MB), 2 attempts, converted from HEIC
//! 002 broken.jpg
//!     FAILED: Invalid image: ...
//!
//! Compressed 1 of 2, 1 failed
//! ```
//!
//! ## Progress (`-v`)
//!
//! ```text
//! IMG_0042.HEIC: converted to IMG_0042.jpg
//! IMG_0042.jpg: 1024px q80 → 1024x768, 1.1 MB (over)
//! IMG_0042.jpg: 1024px q70 → 1024x768, 812.4 KB (fits)
//! ```
//!
//! ## Plan
//!
//! ```text
//! Budget: 943718 bytes (921.6 KB), webp
//! 1024px: q80 q70 q60 q50 q40
//!  896px: q80 q70 q60 q50 q40
//! ...
//! Worst case: 20 trials
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::batch::{BatchReport, EntryStatus};
use crate::compress::{CompressEvent, CompressionSettings};
use crate::types::CompressionSummary;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable byte count, binary units.
///
/// ```text
/// 512       → 512 B
/// 2048      → 2.0 KB
/// 943718    → 921.6 KB
/// 3250000   → 3.1 MB
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn summary_line(summary: &CompressionSummary) -> String {
    let mut line = format!(
        "{}x{} q{}, {} (from {}), {}",
        summary.width,
        summary.height,
        summary.quality,
        format_bytes(summary.bytes),
        format_bytes(summary.original_bytes),
        plural(summary.attempts, "attempt"),
    );
    if summary.converted_from_heic {
        line.push_str(", converted from HEIC");
    }
    line
}

fn display_name(source: &str) -> &str {
    std::path::Path::new(source)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(source)
}

// ============================================================================
// Compress
// ============================================================================

pub fn format_report(report: &BatchReport) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, entry) in report.entries.iter().enumerate() {
        let name = display_name(&entry.source);
        match &entry.status {
            EntryStatus::Compressed { output, summary } => {
                lines.push(format!("{} {} → {}", format_index(i + 1), name, output));
                lines.push(format!("    {}", summary_line(summary)));
            }
            EntryStatus::Failed { error } => {
                lines.push(format!("{} {}", format_index(i + 1), name));
                lines.push(format!("    FAILED: {}", error));
            }
        }
    }
    if !lines.is_empty() {
        lines.push(String::new());
    }
    let failures = report.failures();
    let mut total = format!(
        "Compressed {} of {}",
        report.compressed(),
        report.entries.len()
    );
    if failures > 0 {
        total.push_str(&format!(", {} failed", failures));
    }
    lines.push(total);
    lines
}

pub fn print_report(report: &BatchReport) {
    for line in format_report(report) {
        println!("{}", line);
    }
}

pub fn print_report_json(report: &BatchReport) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

// ============================================================================
// Progress events
// ============================================================================

pub fn format_event(event: &CompressEvent) -> Vec<String> {
    match event {
        CompressEvent::Converted { from, to } => {
            vec![format!("{}: converted to {}", from, to)]
        }
        CompressEvent::TrialFinished {
            name,
            trial,
            dimensions,
            bytes,
            fits,
        } => vec![format!(
            "{}: {}px q{} → {}x{}, {} ({})",
            name,
            trial.max_dimension,
            trial.quality.value(),
            dimensions.width,
            dimensions.height,
            format_bytes(*bytes),
            if *fits { "fits" } else { "over" }
        )],
    }
}

// ============================================================================
// Plan
// ============================================================================

/// The trial grid in the order the search walks it.
pub fn format_plan(settings: &CompressionSettings) -> Vec<String> {
    let mut lines = vec![format!(
        "Budget: {} bytes ({}), {}",
        settings.max_bytes,
        format_bytes(settings.max_bytes),
        settings.format.extension()
    )];

    let mut rows: Vec<(u32, Vec<String>)> = Vec::new();
    for trial in settings.plan.trials() {
        let q = format!("q{}", trial.quality.value());
        match rows.last_mut() {
            Some((dim, qs)) if *dim == trial.max_dimension => qs.push(q),
            _ => rows.push((trial.max_dimension, vec![q])),
        }
    }
    let width = rows
        .iter()
        .map(|(dim, _)| dim.to_string().len())
        .max()
        .unwrap_or(0);
    for (dim, qs) in &rows {
        lines.push(format!("{:>width$}px: {}", dim, qs.join(" ")));
    }

    lines.push(format!(
        "Worst case: {}",
        plural(settings.plan.worst_case_trials(), "trial")
    ));
    lines
}

pub fn print_plan(settings: &CompressionSettings) {
    for line in format_plan(settings) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
