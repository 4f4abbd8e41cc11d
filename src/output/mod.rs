mod progress;
mod styling;
mod summary;
mod tables;

pub use progress::ScanProgress;
use styling::{banner_title, muted};
pub use summary::print_report;

/// Prints the `testrail-archiver` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        banner_title("🗄️ testrail-archiver"),
        muted(env!("CARGO_PKG_VERSION")),
        muted("TestRail runs aggregation job")
    );
}
