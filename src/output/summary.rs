use std::fmt::Write;

use comfy_table::Cell;

use crate::pipeline::{PipelineReport, PipelineState};

use super::styling::{emphasis, failed, heading, muted, notice, succeeded};
use super::tables::{create_cyan_header, create_table, failure_kind_cell, status_cell};

const MAX_FAILURE_ROWS: usize = 20;

/// Prints a human-readable summary of one pipeline invocation to stderr.
///
/// Shows the run status, the state trail, scan counts, the archive location
/// and a table of probes that failed (network errors, 5xx, malformed bodies),
/// which are otherwise invisible in the archived document.
pub fn print_report(report: &PipelineReport) {
    eprintln!("{}", render_report(report));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", emphasis(emoji), heading(title));
}

fn format_trail(trail: &[PipelineState]) -> String {
    trail
        .iter()
        .map(|state| format!("{state:?}"))
        .collect::<Vec<_>>()
        .join(" → ")
}

fn render_report(report: &PipelineReport) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Overview");

    let mut overview = create_table();
    overview.add_row(vec![Cell::new("Status"), status_cell(report.status)]);
    overview.add_row(vec![
        Cell::new("States"),
        Cell::new(format_trail(&report.trail)),
    ]);
    overview.add_row(vec![
        Cell::new("Projects probed"),
        Cell::new(report.diagnostics.probed),
    ]);
    overview.add_row(vec![
        Cell::new("Projects archived"),
        Cell::new(report.projects),
    ]);
    overview.add_row(vec![
        Cell::new("Absent"),
        Cell::new(report.diagnostics.absent),
    ]);
    overview.add_row(vec![
        Cell::new("Failed probes"),
        Cell::new(report.diagnostics.failures.len()),
    ]);
    let _ = writeln!(output, "{overview}\n");

    add_section_header(&mut output, "🗄️", "Archive");
    match &report.archive {
        Some(receipt) => {
            let _ = writeln!(
                output,
                "  {} {}://{}/{} {}\n",
                succeeded("✓"),
                receipt.backend,
                receipt.bucket,
                receipt.key,
                muted(format!("({} bytes)", receipt.bytes))
            );
        }
        None if report.trail.contains(&PipelineState::SkippedEmpty) => {
            let _ = writeln!(
                output,
                "  {} {}\n",
                notice("–"),
                notice("No data found for any projects; nothing archived.")
            );
        }
        None => {
            let _ = writeln!(
                output,
                "  {} {} {}\n",
                failed("✗"),
                failed("Not archived."),
                muted(format!("(would have been {})", report.archive_path))
            );
        }
    }

    if !report.diagnostics.failures.is_empty() {
        add_section_header(&mut output, "⚠️", "Failed Probes");

        let mut failures = create_table();
        failures.set_header(create_cyan_header(&["Project", "Call", "Kind", "Status", "Detail"]));

        for failure in report.diagnostics.failures.iter().take(MAX_FAILURE_ROWS) {
            failures.add_row(vec![
                Cell::new(failure.project_id),
                Cell::new(failure.stage),
                failure_kind_cell(failure.kind),
                Cell::new(
                    failure
                        .status
                        .map_or_else(|| "-".to_string(), |status| status.to_string()),
                ),
                Cell::new(&failure.message),
            ]);
        }

        if report.diagnostics.failures.len() > MAX_FAILURE_ROWS {
            failures.add_row(vec![Cell::new(format!(
                "... and {} more",
                report.diagnostics.failures.len() - MAX_FAILURE_ROWS
            ))]);
        }

        let _ = writeln!(output, "{failures}\n");
    }

    let _ = write!(output, "{}", emphasis(&report.message));
    output
}
