use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use crate::error::{HarvestError, Result, StoreErrorKind};

use super::ObjectStore;

/// S3-compatible store reached over plain HTTP `PUT`.
///
/// Works against path-style endpoints (`{endpoint}/{bucket}/{key}`) such as
/// MinIO, LocalStack or a presigning gateway.
pub struct S3LikeStore {
    endpoint: String,
    bearer_token: Option<String>,
    client: Client,
}

impl S3LikeStore {
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("testrail-archiver/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .map_err(|e| HarvestError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bearer_token: None,
            client,
        })
    }

    #[must_use]
    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|t| !t.is_empty());
        self
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint,
            bucket,
            key.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl ObjectStore for S3LikeStore {
    fn backend(&self) -> &'static str {
        "s3"
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let url = self.object_url(bucket, key);
        let size = body.len();
        let started = Instant::now();
        debug!("PUT {url} ({size} bytes)");

        let mut request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| HarvestError::store(StoreErrorKind::Network, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            info!(
                "Stored {size} bytes at {bucket}/{key} in {}ms",
                started.elapsed().as_millis()
            );
            return Ok(());
        }

        let detail = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        let kind = match status.as_u16() {
            401 | 403 => StoreErrorKind::Unauthorized,
            404 => StoreErrorKind::BucketNotFound,
            _ => StoreErrorKind::Rejected,
        };

        Err(HarvestError::store(
            kind,
            format!("PUT {bucket}/{key} failed with status {status}: {detail}"),
        ))
    }
}
