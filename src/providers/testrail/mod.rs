mod client;
mod fetcher;
mod types;

pub use client::{ProjectApi, TestRailClient};
pub use fetcher::fetch_project_runs;
pub use types::{FailureKind, ProbeFailure, ProbeOutcome, ProjectId, ProjectRecord};

#[cfg(test)]
pub use client::{ApiReply, Endpoint};
#[cfg(test)]
pub use types::{AbsentReason, ProbeStage};
