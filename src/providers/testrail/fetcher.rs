use log::debug;
use serde_json::Value;

use crate::auth::Credential;
use crate::error::HarvestError;

use super::client::{Endpoint, ProjectApi};
use super::types::{
    AbsentReason, FailureKind, ProbeFailure, ProbeOutcome, ProjectId, ProjectMetadata,
    ProjectRecord,
};

const BODY_EXCERPT_CHARS: usize = 200;

enum StatusClass {
    Ok,
    Absent,
    Failure(FailureKind),
}

/// Only 200 counts as success. 401 means the credential was refused, 429 and
/// 5xx are transient. Every other status reads as "no such project".
fn classify_status(status: u16) -> StatusClass {
    match status {
        200 => StatusClass::Ok,
        401 => StatusClass::Failure(FailureKind::Unauthorized),
        429 => StatusClass::Failure(FailureKind::RateLimited),
        500..=599 => StatusClass::Failure(FailureKind::ServerError),
        _ => StatusClass::Absent,
    }
}

enum Fetched {
    Body(String),
    Absent(u16),
    Failed(ProbeFailure),
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > BODY_EXCERPT_CHARS {
        let cut: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}

async fn fetch(
    api: &dyn ProjectApi,
    project_id: ProjectId,
    endpoint: Endpoint,
    credential: &Credential,
) -> Fetched {
    let reply = match api.get(endpoint, credential).await {
        Ok(reply) => reply,
        Err(e) => {
            let kind = match &e {
                HarvestError::Network(err) if err.is_timeout() => FailureKind::Timeout,
                _ => FailureKind::Network,
            };
            return Fetched::Failed(ProbeFailure {
                project_id,
                stage: endpoint.stage(),
                kind,
                status: None,
                message: e.to_string(),
            });
        }
    };

    match classify_status(reply.status) {
        StatusClass::Ok => Fetched::Body(reply.body),
        StatusClass::Absent => {
            debug!(
                "Error fetching {} for project {project_id} (status {}): {}",
                endpoint.stage(),
                reply.status,
                excerpt(&reply.body)
            );
            Fetched::Absent(reply.status)
        }
        StatusClass::Failure(kind) => Fetched::Failed(ProbeFailure {
            project_id,
            stage: endpoint.stage(),
            kind,
            status: Some(reply.status),
            message: excerpt(&reply.body),
        }),
    }
}

fn malformed(project_id: ProjectId, endpoint: Endpoint, message: String) -> ProbeOutcome {
    ProbeOutcome::Failed(ProbeFailure {
        project_id,
        stage: endpoint.stage(),
        kind: FailureKind::Malformed,
        status: Some(200),
        message,
    })
}

/// A runs payload counts only when its `runs` member is a non-empty
/// collection.
fn has_runs(payload: &Value) -> bool {
    match payload.get("runs") {
        Some(Value::Array(runs)) => !runs.is_empty(),
        Some(Value::Object(runs)) => !runs.is_empty(),
        _ => false,
    }
}

/// Probes one project: metadata first, then its runs.
///
/// The runs endpoint is only called when the metadata call returned 200.
/// Nothing here returns an error; every outcome is a [`ProbeOutcome`] so a
/// single project can never abort a scan.
pub async fn fetch_project_runs(
    api: &dyn ProjectApi,
    project_id: ProjectId,
    credential: &Credential,
) -> ProbeOutcome {
    let project_endpoint = Endpoint::Project(project_id);
    let body = match fetch(api, project_id, project_endpoint, credential).await {
        Fetched::Body(body) => body,
        Fetched::Absent(status) => {
            return ProbeOutcome::Absent(AbsentReason::ProjectUnavailable { status })
        }
        Fetched::Failed(failure) => return ProbeOutcome::Failed(failure),
    };

    let metadata: ProjectMetadata = match serde_json::from_str(&body) {
        Ok(metadata) => metadata,
        Err(e) => {
            return malformed(
                project_id,
                project_endpoint,
                format!("unreadable project metadata: {e}"),
            )
        }
    };

    let runs_endpoint = Endpoint::Runs(project_id);
    let body = match fetch(api, project_id, runs_endpoint, credential).await {
        Fetched::Body(body) => body,
        Fetched::Absent(status) => {
            return ProbeOutcome::Absent(AbsentReason::RunsUnavailable { status })
        }
        Fetched::Failed(failure) => return ProbeOutcome::Failed(failure),
    };

    let runs: Value = match serde_json::from_str(&body) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => {
            return malformed(
                project_id,
                runs_endpoint,
                "runs response is not a JSON object".to_string(),
            )
        }
        Err(e) => {
            return malformed(project_id, runs_endpoint, format!("unreadable runs payload: {e}"))
        }
    };

    if !has_runs(&runs) {
        debug!("Project {project_id} ({}) has no runs", metadata.name);
        return ProbeOutcome::Absent(AbsentReason::NoRuns);
    }

    ProbeOutcome::Present(ProjectRecord {
        name: metadata.name,
        runs,
    })
}
