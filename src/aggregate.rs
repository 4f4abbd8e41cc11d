use std::pin::pin;

use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::Serialize;

use crate::auth::Credential;
use crate::error::{HarvestError, Result};
use crate::output::ScanProgress;
use crate::providers::testrail::{
    fetch_project_runs, FailureKind, ProbeFailure, ProbeOutcome, ProjectApi, ProjectId,
    ProjectRecord,
};

/// Where the identifiers to probe come from.
///
/// TestRail's v2 API has no cheap project listing for every account type, so
/// the only source today is a brute-force range scan.
pub trait ProjectIdSource: Send + Sync {
    fn project_ids(&self) -> Vec<ProjectId>;

    fn describe(&self) -> String;
}

/// Inclusive identifier range, probed in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeScan {
    first: u32,
    last: u32,
}

impl RangeScan {
    pub fn new(first: u32, last: u32) -> Result<Self> {
        if first == 0 || first > last {
            return Err(HarvestError::Config(format!(
                "Invalid project id range {first}..={last}"
            )));
        }
        Ok(Self { first, last })
    }
}

impl ProjectIdSource for RangeScan {
    fn project_ids(&self) -> Vec<ProjectId> {
        (self.first..=self.last).map(ProjectId).collect()
    }

    fn describe(&self) -> String {
        format!("project ids {}..={}", self.first, self.last)
    }
}

/// Projects keyed `project_<id>`, in ascending id order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AggregateDocument {
    projects: IndexMap<String, ProjectRecord>,
}

impl AggregateDocument {
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, id: ProjectId) -> Option<&ProjectRecord> {
        self.projects.get(&id.document_key())
    }

    #[cfg(test)]
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.projects.keys().map(String::as_str)
    }

    /// Compact JSON with a fixed key order: entries by ascending id, nested
    /// payload objects sorted by key.
    pub fn to_canonical_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Per-identifier bookkeeping kept beside the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanDiagnostics {
    pub probed: usize,
    pub present: usize,
    pub absent: usize,
    pub failures: Vec<ProbeFailure>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResult {
    pub document: AggregateDocument,
    pub diagnostics: ScanDiagnostics,
}

impl ScanResult {
    /// Folds one probe outcome into the result. Only `Present` outcomes add
    /// a document entry.
    #[must_use]
    pub fn absorb(mut self, id: ProjectId, outcome: ProbeOutcome) -> Self {
        self.diagnostics.probed += 1;
        match outcome {
            ProbeOutcome::Present(record) => {
                debug!("Project {id} '{}' collected", record.name);
                self.diagnostics.present += 1;
                self.document.projects.insert(id.document_key(), record);
            }
            ProbeOutcome::Absent(reason) => {
                debug!("Project {id} skipped: {reason:?}");
                self.diagnostics.absent += 1;
            }
            ProbeOutcome::Failed(failure) => {
                warn!("Probe failed: {failure}");
                self.diagnostics.failures.push(failure);
            }
        }
        self
    }
}

/// Drives the per-project probe across an id source.
pub struct Aggregator<'a> {
    api: &'a dyn ProjectApi,
    concurrency: usize,
    escalate_auth_errors: bool,
}

impl<'a> Aggregator<'a> {
    pub fn new(api: &'a dyn ProjectApi) -> Self {
        Self {
            api,
            concurrency: 1,
            escalate_auth_errors: true,
        }
    }

    /// Number of probes in flight. `1` is strictly sequential.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn escalate_auth_errors(mut self, escalate: bool) -> Self {
        self.escalate_auth_errors = escalate;
        self
    }

    /// Probes every id from `source` and folds the outcomes.
    ///
    /// Outcomes are consumed in id order regardless of concurrency, so the
    /// document is the same as a sequential scan. Per-project problems end up
    /// in the diagnostics; the only error is a rejected credential when
    /// escalation is on.
    pub async fn run(
        &self,
        credential: &Credential,
        source: &dyn ProjectIdSource,
        progress: &ScanProgress,
    ) -> Result<ScanResult> {
        let ids = source.project_ids();
        info!(
            "Scanning {} ({} probes, concurrency {})",
            source.describe(),
            ids.len(),
            self.concurrency
        );

        let api = self.api;
        let mut probes = pin!(stream::iter(ids)
            .map(move |id| async move { (id, fetch_project_runs(api, id, credential).await) })
            .buffered(self.concurrency));

        let mut scan = ScanResult::default();
        while let Some((id, outcome)) = probes.next().await {
            progress.advance(id, matches!(outcome, ProbeOutcome::Present(_)));

            if let ProbeOutcome::Failed(failure) = &outcome {
                if self.escalate_auth_errors && failure.kind == FailureKind::Unauthorized {
                    return Err(HarvestError::AuthRejected {
                        status: failure.status.unwrap_or(401),
                        endpoint: format!("{}/{id}", failure.stage),
                    });
                }
            }

            scan = scan.absorb(id, outcome);
        }

        info!(
            "Scan finished: {} present, {} absent, {} failed",
            scan.diagnostics.present,
            scan.diagnostics.absent,
            scan.diagnostics.failures.len()
        );

        Ok(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testrail::{AbsentReason, Endpoint};
    use crate::testing::FakeApi;
    use serde_json::json;

    fn credential() -> Credential {
        Credential::new("user", "key")
    }

    fn two_project_api() -> FakeApi {
        FakeApi::new()
            .reply(Endpoint::Project(ProjectId(1)), 200, r#"{"name": "Alpha"}"#)
            .reply(Endpoint::Runs(ProjectId(1)), 200, r#"{"runs": [{"id": 10}]}"#)
            .reply(Endpoint::Project(ProjectId(2)), 200, r#"{"name": "Beta"}"#)
            .reply(Endpoint::Runs(ProjectId(2)), 200, r#"{"runs": []}"#)
    }

    #[test]
    fn test_range_scan_ids() {
        let range = RangeScan::new(1, 100).unwrap();
        let ids = range.project_ids();
        assert_eq!(ids.len(), 100);
        assert_eq!(ids.first(), Some(&ProjectId(1)));
        assert_eq!(ids.last(), Some(&ProjectId(100)));
    }

    #[test]
    fn test_range_scan_rejects_bad_bounds() {
        assert!(RangeScan::new(0, 10).is_err());
        assert!(RangeScan::new(5, 4).is_err());
        assert!(RangeScan::new(7, 7).is_ok());
    }

    #[test]
    fn test_absorb_only_keeps_present_projects() {
        let scan = ScanResult::default()
            .absorb(
                ProjectId(3),
                ProbeOutcome::Present(ProjectRecord {
                    name: "Gamma".to_string(),
                    runs: json!({"runs": [{"id": 1}]}),
                }),
            )
            .absorb(ProjectId(4), ProbeOutcome::Absent(AbsentReason::NoRuns));

        assert_eq!(scan.document.len(), 1);
        assert!(scan.document.get(ProjectId(3)).is_some());
        assert!(scan.document.get(ProjectId(4)).is_none());
        assert_eq!(scan.diagnostics.probed, 2);
        assert_eq!(scan.diagnostics.absent, 1);
    }

    #[tokio::test]
    async fn test_scan_excludes_projects_with_empty_runs() {
        let api = two_project_api();
        let aggregator = Aggregator::new(&api);

        let scan = aggregator
            .run(
                &credential(),
                &RangeScan::new(1, 2).unwrap(),
                &ScanProgress::hidden(),
            )
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(&scan.document).unwrap(),
            json!({"project_1": {"project_name": "Alpha", "runs": {"runs": [{"id": 10}]}}})
        );
        assert_eq!(scan.diagnostics.present, 1);
        assert_eq!(scan.diagnostics.absent, 1);
    }

    #[tokio::test]
    async fn test_scan_keys_follow_ascending_ids() {
        let mut api = FakeApi::new();
        for id in [12, 3, 7] {
            api = api
                .reply(Endpoint::Project(ProjectId(id)), 200, r#"{"name": "P"}"#)
                .reply(Endpoint::Runs(ProjectId(id)), 200, r#"{"runs": [{"id": 1}]}"#);
        }

        let scan = Aggregator::new(&api)
            .run(
                &credential(),
                &RangeScan::new(1, 15).unwrap(),
                &ScanProgress::hidden(),
            )
            .await
            .unwrap();

        let keys: Vec<&str> = scan.document.keys().collect();
        assert_eq!(keys, vec!["project_3", "project_7", "project_12"]);
        assert_eq!(scan.diagnostics.probed, 15);
    }

    #[tokio::test]
    async fn test_concurrent_scan_matches_sequential_scan() {
        let mut api = FakeApi::new();
        for id in 1..=20 {
            api = api.reply(
                Endpoint::Project(ProjectId(id)),
                200,
                &format!(r#"{{"name": "Project {id}"}}"#),
            );
            let runs = if id % 3 == 0 {
                r#"{"runs": []}"#.to_string()
            } else {
                format!(r#"{{"runs": [{{"id": {id}}}]}}"#)
            };
            api = api.reply(Endpoint::Runs(ProjectId(id)), 200, &runs);
        }
        let range = RangeScan::new(1, 20).unwrap();

        let sequential = Aggregator::new(&api)
            .run(&credential(), &range, &ScanProgress::hidden())
            .await
            .unwrap();
        let concurrent = Aggregator::new(&api)
            .with_concurrency(8)
            .run(&credential(), &range, &ScanProgress::hidden())
            .await
            .unwrap();

        assert_eq!(
            sequential.document.to_canonical_json().unwrap(),
            concurrent.document.to_canonical_json().unwrap()
        );
        assert_eq!(sequential.document.len(), 14);
    }

    #[tokio::test]
    async fn test_transient_failure_does_not_abort_scan() {
        let api = two_project_api()
            .network_down(Endpoint::Project(ProjectId(3)))
            .reply(Endpoint::Project(ProjectId(4)), 200, r#"{"name": "Delta"}"#)
            .reply(Endpoint::Runs(ProjectId(4)), 200, r#"{"runs": [{"id": 40}]}"#);

        let scan = Aggregator::new(&api)
            .run(
                &credential(),
                &RangeScan::new(1, 4).unwrap(),
                &ScanProgress::hidden(),
            )
            .await
            .unwrap();

        let keys: Vec<&str> = scan.document.keys().collect();
        assert_eq!(keys, vec!["project_1", "project_4"]);
        assert_eq!(scan.diagnostics.failures.len(), 1);
        assert_eq!(scan.diagnostics.failures[0].project_id, ProjectId(3));
        assert_eq!(scan.diagnostics.failures[0].kind, FailureKind::Network);
    }

    #[tokio::test]
    async fn test_unauthorized_aborts_scan_when_escalating() {
        let api = FakeApi::new().reply(Endpoint::Project(ProjectId(1)), 401, "bad key");

        let err = Aggregator::new(&api)
            .run(
                &credential(),
                &RangeScan::new(1, 5).unwrap(),
                &ScanProgress::hidden(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            HarvestError::AuthRejected { status: 401, ref endpoint } if endpoint == "get_project/1"
        ));
        assert_eq!(api.calls(), vec!["get_project/1".to_string()]);
    }

    #[tokio::test]
    async fn test_unauthorized_is_diagnostic_without_escalation() {
        let api = two_project_api().reply(Endpoint::Project(ProjectId(3)), 401, "bad key");

        let scan = Aggregator::new(&api)
            .escalate_auth_errors(false)
            .run(
                &credential(),
                &RangeScan::new(1, 3).unwrap(),
                &ScanProgress::hidden(),
            )
            .await
            .unwrap();

        assert_eq!(scan.document.len(), 1);
        assert_eq!(scan.diagnostics.failures.len(), 1);
        assert_eq!(scan.diagnostics.failures[0].kind, FailureKind::Unauthorized);
    }

    #[test]
    fn test_canonical_json_is_compact_and_key_sorted() {
        let payload: serde_json::Value =
            serde_json::from_str(r#"{"runs": [{"name": "r", "id": 10}], "offset": 0}"#).unwrap();
        let scan = ScanResult::default().absorb(
            ProjectId(1),
            ProbeOutcome::Present(ProjectRecord {
                name: "Alpha".to_string(),
                runs: payload,
            }),
        );

        let bytes = scan.document.to_canonical_json().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"project_1":{"project_name":"Alpha","runs":{"offset":0,"runs":[{"id":10,"name":"r"}]}}}"#
        );
    }
}
