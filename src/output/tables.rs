use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::pipeline::RunStatus;
use crate::providers::testrail::FailureKind;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

pub fn status_cell(status: RunStatus) -> Cell {
    match status {
        RunStatus::Success => Cell::new(format!("success ({})", status.code())).fg(TableColor::Green),
        RunStatus::Failure => Cell::new(format!("failure ({})", status.code())).fg(TableColor::Red),
    }
}

/// Transient kinds in yellow, the ones a rerun will not fix in red.
pub fn failure_kind_cell(kind: FailureKind) -> Cell {
    let color = match kind {
        FailureKind::Network
        | FailureKind::Timeout
        | FailureKind::RateLimited
        | FailureKind::ServerError => TableColor::Yellow,
        FailureKind::Unauthorized | FailureKind::Malformed => TableColor::Red,
    };
    Cell::new(kind.as_str()).fg(color)
}
