use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Numeric TestRail project identifier. Existence is not guaranteed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub u32);

impl ProjectId {
    /// Key under which the project appears in the aggregate document.
    pub fn document_key(self) -> String {
        format!("project_{}", self.0)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Body of `get_project/{id}`. Only the name is required.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMetadata {
    pub name: String,
}

/// A project that exists and has at least one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    #[serde(rename = "project_name")]
    pub name: String,
    /// The `get_runs/{id}` response, passed through unmodified.
    pub runs: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStage {
    Project,
    Runs,
}

impl fmt::Display for ProbeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project => f.write_str("get_project"),
            Self::Runs => f.write_str("get_runs"),
        }
    }
}

/// Why a probe produced no document entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsentReason {
    ProjectUnavailable { status: u16 },
    RunsUnavailable { status: u16 },
    NoRuns,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    Timeout,
    RateLimited,
    ServerError,
    Unauthorized,
    Malformed,
}

impl FailureKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::Unauthorized => "unauthorized",
            Self::Malformed => "malformed",
        }
    }
}

/// A probe that could not be classified as present or absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeFailure {
    pub project_id: ProjectId,
    pub stage: ProbeStage,
    pub kind: FailureKind,
    pub status: Option<u16>,
    pub message: String,
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "project {} {} {}",
            self.project_id,
            self.stage,
            self.kind.as_str()
        )?;
        if let Some(status) = self.status {
            write!(f, " (status {status})")?;
        }
        write!(f, ": {}", self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Present(ProjectRecord),
    Absent(AbsentReason),
    Failed(ProbeFailure),
}
