use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::providers::testrail::ProjectId;

use super::styling::{emphasis, failed, heading, notice, succeeded};

/// Progress bar for the project scan, drawn on stderr.
pub struct ScanProgress {
    pb: ProgressBar,
}

impl ScanProgress {
    pub fn new(total: usize, visible: bool) -> Self {
        if !visible {
            return Self::hidden();
        }

        eprintln!("{}  {}", emphasis("⚙️"), heading("Scan"));

        let pb = ProgressBar::new(total as u64);
        pb.set_draw_target(ProgressDrawTarget::stderr());
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {msg} [{bar:30.cyan/blue}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.set_message(notice("Probing projects").to_string());

        Self { pb }
    }

    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }

    pub fn advance(&self, id: ProjectId, present: bool) {
        if present {
            self.pb
                .set_message(notice(format!("Collected project {id}")).to_string());
        }
        self.pb.inc(1);
    }

    pub fn finish(&self, present: usize) {
        self.pb.finish_with_message(
            succeeded(format!("Scan complete: {present} projects with runs ✓")).to_string(),
        );
    }

    pub fn abandon(&self) {
        self.pb
            .abandon_with_message(failed("Scan aborted ✗").to_string());
    }
}
