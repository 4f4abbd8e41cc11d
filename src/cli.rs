use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use log::info;

use crate::archive::ArchivePath;
use crate::config::{Config, SecretBackend, StorageBackend};
use crate::output::print_report;
use crate::pipeline::Pipeline;
use crate::providers::testrail::{ProjectApi, TestRailClient};
use crate::secrets::{EnvSecretStore, FileSecretStore, SecretStore};
use crate::storage::{LocalFsStore, ObjectStore, S3LikeStore};

#[derive(Parser)]
#[command(name = "testrail-archiver")]
#[command(author, version, about = "Daily TestRail runs archiver", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (toml, json or yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write the invocation result here instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect runs for every project and archive the aggregate
    Run {
        #[arg(long)]
        base_url: Option<String>,

        #[arg(long)]
        secret_name: Option<String>,

        #[arg(short, long)]
        bucket: Option<String>,

        #[arg(long)]
        first_id: Option<u32>,

        #[arg(long)]
        last_id: Option<u32>,

        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Archive date (YYYY-MM-DD); defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// S3-compatible gateway to archive to
        #[arg(long)]
        store_endpoint: Option<String>,

        /// Archive to this directory instead of the object store
        #[arg(long)]
        storage_root: Option<PathBuf>,

        #[arg(long, env = "ARCHIVE_STORE_TOKEN", hide_env_values = true)]
        store_token: Option<String>,

        #[arg(long, default_value_t = false)]
        no_progress: bool,
    },

    /// Print the object key a run on the given date writes
    ArchivePath {
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Write the default configuration to a file
    InitConfig { path: PathBuf },
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn secret_store(config: &Config) -> Result<Arc<dyn SecretStore>> {
    let store: Arc<dyn SecretStore> = match config.secrets.backend {
        SecretBackend::Env => Arc::new(EnvSecretStore::new(config.secrets.env_prefix.clone())),
        SecretBackend::File => {
            let dir = config
                .secrets
                .dir
                .clone()
                .context("secrets.dir is required for the file secret backend")?;
            Arc::new(FileSecretStore::new(dir))
        }
    };
    Ok(store)
}

fn object_store(config: &Config) -> Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.storage.backend {
        StorageBackend::S3 => {
            let endpoint = config
                .storage
                .endpoint
                .as_deref()
                .context("storage.endpoint is required for the s3 storage backend")?;
            Arc::new(
                S3LikeStore::new(endpoint, config.testrail.request_timeout())?
                    .with_bearer_token(config.storage.token.clone()),
            )
        }
        StorageBackend::Local => {
            let root = config
                .storage
                .root
                .clone()
                .context("storage.root is required for the local storage backend")?;
            Arc::new(LocalFsStore::new(root))
        }
    };
    Ok(store)
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        Config::load(self.config.as_deref())
    }

    fn write_output(&self, json_output: &str) -> Result<()> {
        if let Some(output_path) = &self.output {
            std::fs::write(output_path, json_output)
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
            info!("Invocation result written to: {}", output_path.display());
        } else {
            println!("{}", json_output);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_run(
        &self,
        base_url: &Option<String>,
        secret_name: &Option<String>,
        bucket: &Option<String>,
        first_id: Option<u32>,
        last_id: Option<u32>,
        concurrency: Option<usize>,
        date: Option<NaiveDate>,
        store_endpoint: &Option<String>,
        storage_root: &Option<PathBuf>,
        store_token: &Option<String>,
        no_progress: bool,
    ) -> Result<ExitCode> {
        let mut config = self.load_config()?;

        if let Some(base_url) = base_url {
            config.testrail.base_url = base_url.clone();
        }
        if let Some(secret_name) = secret_name {
            config.secrets.name = secret_name.clone();
        }
        if let Some(bucket) = bucket {
            config.storage.bucket = bucket.clone();
        }
        if let Some(first_id) = first_id {
            config.testrail.first_project_id = first_id;
        }
        if let Some(last_id) = last_id {
            config.testrail.last_project_id = last_id;
        }
        if let Some(concurrency) = concurrency {
            config.testrail.concurrency = concurrency;
        }
        if store_endpoint.is_some() {
            config.storage.endpoint = store_endpoint.clone();
        }
        if let Some(root) = storage_root {
            config.storage.backend = StorageBackend::Local;
            config.storage.root = Some(root.clone());
        }
        if store_token.is_some() {
            config.storage.token = store_token.clone();
        }
        config.validate()?;

        let api: Arc<dyn ProjectApi> = Arc::new(TestRailClient::new(
            &config.testrail.base_url,
            config.testrail.request_timeout(),
        )?);
        let pipeline = Pipeline::new(
            config.pipeline_settings(),
            secret_store(&config)?,
            api,
            object_store(&config)?,
        )
        .with_progress(!no_progress);

        let settings = pipeline.settings();
        info!(
            "Collecting TestRail runs for projects {}..={} into {}",
            settings.first_project_id, settings.last_project_id, settings.bucket
        );

        let report = pipeline.run(date.unwrap_or_else(today)).await;
        info!("Pipeline finished in state {:?}", report.final_state());
        print_report(&report);

        let result = report.invocation_result();
        let json_output = if self.pretty || config.output.pretty {
            serde_json::to_string_pretty(&result)?
        } else {
            serde_json::to_string(&result)?
        };
        self.write_output(&json_output)?;

        Ok(if report.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    }

    fn execute_archive_path(&self, date: Option<NaiveDate>) -> Result<ExitCode> {
        let config = self.load_config()?;
        let path = ArchivePath::for_date(&config.storage.prefix, date.unwrap_or_else(today));
        self.write_output(&format!("{}/{}", config.storage.bucket, path))?;
        Ok(ExitCode::SUCCESS)
    }

    fn execute_init_config(&self, path: &Path) -> Result<ExitCode> {
        Config::default().save(path)?;
        info!("Default configuration written to: {}", path.display());
        Ok(ExitCode::SUCCESS)
    }

    pub async fn execute(&self) -> Result<ExitCode> {
        match &self.command {
            Commands::Run {
                base_url,
                secret_name,
                bucket,
                first_id,
                last_id,
                concurrency,
                date,
                store_endpoint,
                storage_root,
                store_token,
                no_progress,
            } => {
                self.execute_run(
                    base_url,
                    secret_name,
                    bucket,
                    *first_id,
                    *last_id,
                    *concurrency,
                    *date,
                    store_endpoint,
                    storage_root,
                    store_token,
                    *no_progress,
                )
                .await
            }
            Commands::ArchivePath { date } => self.execute_archive_path(*date),
            Commands::InitConfig { path } => self.execute_init_config(path),
        }
    }
}
