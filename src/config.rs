use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::archive::DEFAULT_ARCHIVE_PREFIX;
use crate::pipeline::PipelineSettings;

const CONFIG_CANDIDATES: [&str; 4] = [
    "testrail-archiver.toml",
    "testrail-archiver.json",
    "testrail-archiver.yaml",
    "testrail-archiver.yml",
];

/// Configuration file structure for the archiver job.
///
/// Every value except the S3-compatible endpoint has a default matching the
/// production job. A run against the `s3` backend needs `storage.endpoint`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// TestRail API and scan settings
    #[serde(default)]
    pub testrail: TestRailConfig,

    /// Where the API credential is read from
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Where the aggregate is archived
    #[serde(default)]
    pub storage: StorageConfig,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestRailConfig {
    /// API root, e.g. `https://org.testrail.io/index.php?/api/v2`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// First project id probed (inclusive)
    #[serde(default = "default_first_project_id")]
    pub first_project_id: u32,

    /// Last project id probed (inclusive)
    #[serde(default = "default_last_project_id")]
    pub last_project_id: u32,

    /// Per-request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Deadline for the whole scan; unset means no deadline
    #[serde(default = "default_scan_deadline_secs")]
    pub scan_deadline_secs: Option<u64>,

    /// Probes in flight; 1 scans strictly sequentially
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Abort the scan on the first HTTP 401
    #[serde(default = "default_true")]
    pub escalate_auth_errors: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecretBackend {
    #[default]
    Env,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SecretsConfig {
    #[serde(default)]
    pub backend: SecretBackend,

    /// Logical secret name
    #[serde(default = "default_secret_name")]
    pub name: String,

    /// Directory holding `<name>.json` (file backend)
    pub dir: Option<PathBuf>,

    /// Prefix prepended to the derived variable name (env backend)
    pub env_prefix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    S3,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// S3-compatible gateway reached with plain `PUT`s (MinIO, LocalStack or
    /// a presigning proxy). Required for the `s3` backend; requests are not
    /// SigV4-signed, so AWS S3 itself cannot be the target.
    pub endpoint: Option<String>,

    /// Bearer token for the S3-compatible endpoint
    pub token: Option<String>,

    /// Root directory (local backend); buckets are its subdirectories
    pub root: Option<PathBuf>,

    /// Key prefix in front of the date partition
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Pretty-print the invocation result JSON
    #[serde(default)]
    pub pretty: bool,
}

impl Default for TestRailConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            first_project_id: default_first_project_id(),
            last_project_id: default_last_project_id(),
            request_timeout_secs: default_request_timeout_secs(),
            scan_deadline_secs: default_scan_deadline_secs(),
            concurrency: default_concurrency(),
            escalate_auth_errors: true,
        }
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            backend: SecretBackend::Env,
            name: default_secret_name(),
            dir: None,
            env_prefix: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            bucket: default_bucket(),
            endpoint: None,
            token: None,
            root: None,
            prefix: default_prefix(),
        }
    }
}

fn default_base_url() -> String {
    "https://org.testrail.io/index.php?/api/v2".to_string()
}

fn default_first_project_id() -> u32 {
    1
}

fn default_last_project_id() -> u32 {
    100
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[allow(clippy::unnecessary_wraps)]
fn default_scan_deadline_secs() -> Option<u64> {
    Some(900)
}

fn default_concurrency() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_secret_name() -> String {
    "dwh-testrail-credentials".to_string()
}

fn default_bucket() -> String {
    "dlx-datalake".to_string()
}

fn default_prefix() -> String {
    DEFAULT_ARCHIVE_PREFIX.to_string()
}

impl TestRailConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./testrail-archiver.{toml,json,yaml,yml}
    /// 3. `<config dir>/testrail-archiver/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        for candidate in &CONFIG_CANDIDATES {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        if let Some(user_config) = dirs::config_dir()
            .map(|dir| dir.join("testrail-archiver").join("config.toml"))
            .filter(|path| path.exists())
        {
            return Self::load_from_path(&user_config);
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml") | Some("yml") => serde_yaml::to_string(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Checks the values a run depends on before anything touches the network.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.testrail.base_url)
            .with_context(|| format!("Invalid TestRail base URL: {}", self.testrail.base_url))?;

        if self.testrail.first_project_id == 0 {
            bail!("first-project-id must be at least 1");
        }
        if self.testrail.first_project_id > self.testrail.last_project_id {
            bail!(
                "first-project-id ({}) is greater than last-project-id ({})",
                self.testrail.first_project_id,
                self.testrail.last_project_id
            );
        }
        if self.testrail.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.storage.bucket.trim().is_empty() {
            bail!("storage bucket must not be empty");
        }
        if self.secrets.backend == SecretBackend::File && self.secrets.dir.is_none() {
            bail!("secrets.dir is required for the file secret backend");
        }
        if self.storage.backend == StorageBackend::Local && self.storage.root.is_none() {
            bail!("storage.root is required for the local storage backend");
        }
        if self.storage.backend == StorageBackend::S3 {
            let endpoint = self
                .storage
                .endpoint
                .as_deref()
                .context("storage.endpoint is required for the s3 storage backend")?;
            Url::parse(endpoint)
                .with_context(|| format!("Invalid storage endpoint: {endpoint}"))?;
        }

        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            secret_name: self.secrets.name.clone(),
            bucket: self.storage.bucket.clone(),
            archive_prefix: self.storage.prefix.clone(),
            first_project_id: self.testrail.first_project_id,
            last_project_id: self.testrail.last_project_id,
            concurrency: self.testrail.concurrency,
            escalate_auth_errors: self.testrail.escalate_auth_errors,
            scan_deadline: self.testrail.scan_deadline_secs.map(Duration::from_secs),
        }
    }
}
