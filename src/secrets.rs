use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use serde_json::{Map, Value};

use crate::auth::Credential;
use crate::error::{HarvestError, Result};

/// Read access to a named-secret backend.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Short backend label used in log lines.
    fn backend(&self) -> &'static str;

    /// Returns the raw secret payload stored under `name`.
    async fn secret_string(&self, name: &str) -> Result<String>;
}

/// Secrets held in environment variables.
///
/// `dwh-testrail-credentials` is looked up as `DWH_TESTRAIL_CREDENTIALS`,
/// with an optional prefix prepended.
pub struct EnvSecretStore {
    prefix: Option<String>,
}

impl EnvSecretStore {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    pub fn variable_name(&self, name: &str) -> String {
        let normalized: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();

        match &self.prefix {
            Some(prefix) => format!("{prefix}{normalized}"),
            None => normalized,
        }
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    fn backend(&self) -> &'static str {
        "env"
    }

    async fn secret_string(&self, name: &str) -> Result<String> {
        let variable = self.variable_name(name);
        std::env::var(&variable)
            .map_err(|_| HarvestError::SecretNotFound(format!("{name} (env {variable})")))
    }
}

/// Secrets stored as `<dir>/<name>.json` files.
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn secret_string(&self, name: &str) -> Result<String> {
        let path = self.dir.join(format!("{name}.json"));
        debug!("Reading secret from: {}", path.display());

        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                HarvestError::SecretNotFound(format!("{name} ({})", path.display())),
            ),
            Err(e) => Err(e.into()),
        }
    }
}

const IDENTITY_FIELDS: [&str; 3] = ["email", "identity", "username"];
const API_KEY_FIELDS: [&str; 2] = ["apikey", "api_key"];

/// First non-blank string among `names`, in order.
fn credential_field(fields: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| fields.get(*name).and_then(Value::as_str))
        .find(|value| !value.trim().is_empty())
        .map(str::to_string)
}

/// Resolves a named secret into a TestRail [`Credential`].
pub struct CredentialProvider {
    store: Arc<dyn SecretStore>,
}

impl CredentialProvider {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Reads `secret_name` and parses it into a credential.
    ///
    /// Every failure mode (backend unreachable, secret missing, malformed
    /// payload, empty fields) is reported as [`HarvestError::Credential`].
    pub async fn resolve(&self, secret_name: &str) -> Result<Credential> {
        info!(
            "Resolving credentials '{}' from {} secret store",
            secret_name,
            self.store.backend()
        );

        let raw = self
            .store
            .secret_string(secret_name)
            .await
            .map_err(|e| HarvestError::Credential(e.to_string()))?;

        let credential = parse_credential(&raw)?;
        debug!("Resolved credentials for {}", credential.identity());
        Ok(credential)
    }
}

fn parse_credential(raw: &str) -> Result<Credential> {
    let fields: Map<String, Value> = serde_json::from_str(raw)
        .map_err(|e| HarvestError::Credential(format!("malformed secret payload: {e}")))?;

    let identity = credential_field(&fields, &IDENTITY_FIELDS)
        .ok_or_else(|| HarvestError::Credential("secret has no 'email' field".into()))?;
    let api_key = credential_field(&fields, &API_KEY_FIELDS)
        .ok_or_else(|| HarvestError::Credential("secret has no 'apikey' field".into()))?;

    Ok(Credential::new(identity, api_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_credential_reads_email_and_apikey() {
        let credential =
            parse_credential(r#"{"email": "qa@example.com", "apikey": "abc123"}"#).unwrap();
        assert_eq!(credential.identity(), "qa@example.com");
        assert_eq!(credential.api_key(), "abc123");
    }

    #[test]
    fn test_parse_credential_accepts_aliases() {
        let credential =
            parse_credential(r#"{"identity": "bot", "api_key": "k", "extra": 1}"#).unwrap();
        assert_eq!(credential.identity(), "bot");
        assert_eq!(credential.api_key(), "k");
    }

    #[test]
    fn test_parse_credential_rejects_missing_or_empty_fields() {
        assert!(matches!(
            parse_credential(r#"{"email": "qa@example.com"}"#),
            Err(HarvestError::Credential(_))
        ));
        assert!(matches!(
            parse_credential(r#"{"email": "", "apikey": "abc"}"#),
            Err(HarvestError::Credential(_))
        ));
        assert!(matches!(
            parse_credential("not json"),
            Err(HarvestError::Credential(_))
        ));
        assert!(matches!(
            parse_credential(r#"["email", "apikey"]"#),
            Err(HarvestError::Credential(_))
        ));
    }

    #[test]
    fn test_parse_credential_prefers_email_over_username() {
        let credential = parse_credential(
            r#"{"username": "legacy", "email": "qa@example.com", "apikey": "k"}"#,
        )
        .unwrap();
        assert_eq!(credential.identity(), "qa@example.com");
    }

    #[test]
    fn test_env_variable_name() {
        let store = EnvSecretStore::new(None);
        assert_eq!(
            store.variable_name("dwh-testrail-credentials"),
            "DWH_TESTRAIL_CREDENTIALS"
        );

        let prefixed = EnvSecretStore::new(Some("SECRET_".to_string()));
        assert_eq!(prefixed.variable_name("a.b"), "SECRET_A_B");
    }

    #[tokio::test]
    async fn test_env_store_resolves_credential() {
        std::env::set_var(
            "ENV_STORE_TEST_TESTRAIL_CREDS",
            r#"{"email": "env@example.com", "apikey": "from-env"}"#,
        );

        let provider = CredentialProvider::new(Arc::new(EnvSecretStore::new(Some(
            "ENV_STORE_TEST_".to_string(),
        ))));
        let credential = provider.resolve("testrail-creds").await.unwrap();

        assert_eq!(credential.identity(), "env@example.com");
        assert_eq!(credential.api_key(), "from-env");
    }

    #[tokio::test]
    async fn test_file_store_resolves_credential() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("dwh-testrail-credentials.json"),
            r#"{"email": "file@example.com", "apikey": "from-file"}"#,
        )
        .unwrap();

        let provider =
            CredentialProvider::new(Arc::new(FileSecretStore::new(dir.path().to_path_buf())));
        let credential = provider.resolve("dwh-testrail-credentials").await.unwrap();

        assert_eq!(credential.identity(), "file@example.com");
    }

    #[tokio::test]
    async fn test_missing_secret_is_credential_failure() {
        let dir = TempDir::new().unwrap();
        let provider =
            CredentialProvider::new(Arc::new(FileSecretStore::new(dir.path().to_path_buf())));

        let err = provider.resolve("absent").await.unwrap_err();
        assert!(matches!(err, HarvestError::Credential(_)));
        assert!(err.to_string().contains("absent"));
    }
}
