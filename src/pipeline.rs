use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregator, ProjectIdSource, RangeScan, ScanDiagnostics, ScanResult};
use crate::archive::{ArchivePath, ArchiveReceipt, Archiver, DEFAULT_ARCHIVE_PREFIX};
use crate::auth::Credential;
use crate::error::{HarvestError, Result};
use crate::output::ScanProgress;
use crate::providers::testrail::ProjectApi;
use crate::secrets::{CredentialProvider, SecretStore};
use crate::storage::ObjectStore;

const COMPLETED_MESSAGE: &str = "Data fetching and aggregation completed.";

/// Fixed inputs of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub secret_name: String,
    pub bucket: String,
    pub archive_prefix: String,
    pub first_project_id: u32,
    pub last_project_id: u32,
    pub concurrency: usize,
    pub escalate_auth_errors: bool,
    pub scan_deadline: Option<Duration>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            secret_name: "dwh-testrail-credentials".to_string(),
            bucket: "dlx-datalake".to_string(),
            archive_prefix: DEFAULT_ARCHIVE_PREFIX.to_string(),
            first_project_id: 1,
            last_project_id: 100,
            concurrency: 1,
            escalate_auth_errors: true,
            scan_deadline: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Init,
    CredentialsResolved,
    Scanned,
    Archived,
    SkippedEmpty,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
}

impl RunStatus {
    pub const fn code(self) -> u16 {
        match self {
            Self::Success => 200,
            Self::Failure => 500,
        }
    }
}

/// The externally visible outcome of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    pub status_code: u16,
    pub body: String,
}

/// Everything one invocation produced, for the terminal summary.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub status: RunStatus,
    pub message: String,
    pub trail: Vec<PipelineState>,
    pub archive_path: ArchivePath,
    pub projects: usize,
    pub diagnostics: ScanDiagnostics,
    pub archive: Option<ArchiveReceipt>,
}

impl PipelineReport {
    pub fn invocation_result(&self) -> InvocationResult {
        InvocationResult {
            status_code: self.status.code(),
            body: self.message.clone(),
        }
    }

    pub fn final_state(&self) -> PipelineState {
        self.trail.last().copied().unwrap_or(PipelineState::Init)
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

struct RunTrail {
    trail: Vec<PipelineState>,
    archive_path: ArchivePath,
}

impl RunTrail {
    fn new(archive_path: ArchivePath) -> Self {
        Self {
            trail: vec![PipelineState::Init],
            archive_path,
        }
    }

    fn enter(&mut self, state: PipelineState) {
        info!("Pipeline state: {state:?}");
        self.trail.push(state);
    }

    fn finish(
        self,
        status: RunStatus,
        message: String,
        scan: Option<ScanResult>,
        archive: Option<ArchiveReceipt>,
    ) -> PipelineReport {
        let (projects, diagnostics) = scan
            .map(|scan| (scan.document.len(), scan.diagnostics))
            .unwrap_or_default();

        PipelineReport {
            status,
            message,
            trail: self.trail,
            archive_path: self.archive_path,
            projects,
            diagnostics,
            archive,
        }
    }

    fn fail(mut self, message: String) -> PipelineReport {
        error!("{message}");
        self.enter(PipelineState::Failed);
        self.finish(RunStatus::Failure, message, None, None)
    }
}

/// Credentials, scan, archive: one invocation of the aggregation job.
pub struct Pipeline {
    settings: PipelineSettings,
    secrets: Arc<dyn SecretStore>,
    api: Arc<dyn ProjectApi>,
    store: Arc<dyn ObjectStore>,
    show_progress: bool,
}

impl Pipeline {
    pub fn new(
        settings: PipelineSettings,
        secrets: Arc<dyn SecretStore>,
        api: Arc<dyn ProjectApi>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            settings,
            secrets,
            api,
            store,
            show_progress: false,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Runs the job for `date`, which only determines the archive key.
    ///
    /// Never returns an error: every failure ends up in the report's status
    /// and message.
    pub async fn run(&self, date: NaiveDate) -> PipelineReport {
        let mut run = RunTrail::new(ArchivePath::for_date(&self.settings.archive_prefix, date));

        let source = match RangeScan::new(
            self.settings.first_project_id,
            self.settings.last_project_id,
        ) {
            Ok(source) => source,
            Err(e) => return run.fail(e.to_string()),
        };

        let credential = match CredentialProvider::new(Arc::clone(&self.secrets))
            .resolve(&self.settings.secret_name)
            .await
        {
            Ok(credential) => credential,
            Err(e) => return run.fail(e.to_string()),
        };
        run.enter(PipelineState::CredentialsResolved);

        let scan = match self.scan(&credential, &source).await {
            Ok(scan) => scan,
            Err(e) => return run.fail(format!("Project scan aborted: {e}")),
        };
        run.enter(PipelineState::Scanned);

        if scan.document.is_empty() {
            info!("No data found for any projects.");
            run.enter(PipelineState::SkippedEmpty);
            run.enter(PipelineState::Done);
            return run.finish(
                RunStatus::Success,
                format!("{COMPLETED_MESSAGE} No data found for any projects."),
                Some(scan),
                None,
            );
        }

        let stored = Archiver::new(self.store.as_ref())
            .store(&self.settings.bucket, &scan.document, &run.archive_path)
            .await;
        match stored {
            Ok(receipt) => {
                run.enter(PipelineState::Archived);
                run.enter(PipelineState::Done);
                let message = format!(
                    "{COMPLETED_MESSAGE} Archived {} projects to {}/{}.",
                    scan.document.len(),
                    receipt.bucket,
                    receipt.key
                );
                run.finish(RunStatus::Success, message, Some(scan), Some(receipt))
            }
            Err(e) => {
                let message = format!(
                    "Error storing data in {}/{}: {e}",
                    self.settings.bucket, run.archive_path
                );
                error!("{message}");
                run.enter(PipelineState::Done);
                run.finish(RunStatus::Failure, message, Some(scan), None)
            }
        }
    }

    async fn scan(
        &self,
        credential: &Credential,
        source: &dyn ProjectIdSource,
    ) -> Result<ScanResult> {
        let progress = ScanProgress::new(source.project_ids().len(), self.show_progress);
        let aggregator = Aggregator::new(self.api.as_ref())
            .with_concurrency(self.settings.concurrency)
            .escalate_auth_errors(self.settings.escalate_auth_errors);

        let scan = aggregator.run(credential, source, &progress);
        let result = match self.settings.scan_deadline {
            Some(deadline) => tokio::time::timeout(deadline, scan)
                .await
                .unwrap_or(Err(HarvestError::ScanDeadline(deadline))),
            None => scan.await,
        };

        match &result {
            Ok(scan) => progress.finish(scan.diagnostics.present),
            Err(_) => progress.abandon(),
        }
        result
    }
}
