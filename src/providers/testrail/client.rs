use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use url::Url;

use crate::auth::Credential;
use crate::error::{HarvestError, Result};

use super::types::{ProbeStage, ProjectId};

/// The two TestRail API v2 endpoints a probe touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Project(ProjectId),
    Runs(ProjectId),
}

impl Endpoint {
    pub fn path(&self) -> String {
        match self {
            Self::Project(id) => format!("get_project/{id}"),
            Self::Runs(id) => format!("get_runs/{id}"),
        }
    }

    pub fn stage(&self) -> ProbeStage {
        match self {
            Self::Project(_) => ProbeStage::Project,
            Self::Runs(_) => ProbeStage::Runs,
        }
    }
}

/// Status and raw body of an API response, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiReply {
    pub status: u16,
    pub body: String,
}

impl ApiReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Authenticated read access to the remote project API.
///
/// Implementations return `Ok` for every HTTP response and `Err` only for
/// transport-level failures; status interpretation belongs to the caller.
#[async_trait]
pub trait ProjectApi: Send + Sync {
    async fn get(&self, endpoint: Endpoint, credential: &Credential) -> Result<ApiReply>;
}

pub struct TestRailClient {
    client: Client,
    base_url: String,
}

impl TestRailClient {
    /// `base_url` is the API root, e.g. `https://org.testrail.io/index.php?/api/v2`.
    /// Endpoint paths are appended verbatim since TestRail routes through the
    /// query string.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        Url::parse(base_url).map_err(|e| HarvestError::Config(format!("Invalid base URL: {e}")))?;

        let client = Client::builder()
            .user_agent(concat!("testrail-archiver/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .map_err(|e| HarvestError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint_url(&self, endpoint: Endpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.path())
    }
}

#[async_trait]
impl ProjectApi for TestRailClient {
    async fn get(&self, endpoint: Endpoint, credential: &Credential) -> Result<ApiReply> {
        let url = self.endpoint_url(endpoint);
        debug!("GET {url}");

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, credential.basic_auth_header())
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(ApiReply::new(status, body))
    }
}
