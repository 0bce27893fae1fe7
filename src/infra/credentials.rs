use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{AnalyzerError, AnalyzerResult};
use crate::infra::config::{SecretConfig, UserConfig};

/// An ordered list of API keys; earlier keys are tried first.
#[derive(Clone, Default, PartialEq)]
pub struct Credentials(Vec<String>);

impl Credentials {
    pub fn new(keys: Vec<String>) -> Self {
        Self(keys.into_iter().filter(|k| !k.trim().is_empty()).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credentials({} redacted)", self.0.len())
    }
}

/// A remote store holding a JSON object whose values are API keys.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch_secret(&self, name: &str, region: &str) -> AnalyzerResult<String>;
}

/// Reads secrets from AWS Secrets Manager through the `aws` CLI.
#[derive(Debug, Clone, Default)]
pub struct AwsCliSecretStore;

#[async_trait]
impl SecretStore for AwsCliSecretStore {
    async fn fetch_secret(&self, name: &str, region: &str) -> AnalyzerResult<String> {
        let output = Command::new("aws")
            .args([
                "secretsmanager",
                "get-secret-value",
                "--secret-id",
                name,
                "--region",
                region,
                "--query",
                "SecretString",
                "--output",
                "text",
            ])
            .output()
            .await
            .map_err(|e| AnalyzerError::SecretStore(format!("failed to run aws CLI: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnalyzerError::SecretStore(format!(
                "get-secret-value for {name} failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map(|s| s.trim().to_string())
            .map_err(|e| AnalyzerError::SecretStore(format!("secret is not UTF-8: {e}")))
    }
}

pub struct CredentialResolver<S> {
    files: Vec<PathBuf>,
    secret: SecretConfig,
    store: S,
}

impl CredentialResolver<AwsCliSecretStore> {
    pub fn from_config(config: &UserConfig) -> Self {
        Self::new(config.credential_files.clone(), config.secret.clone(), AwsCliSecretStore)
    }
}

impl<S: SecretStore> CredentialResolver<S> {
    pub fn new(files: Vec<PathBuf>, secret: SecretConfig, store: S) -> Self {
        Self { files, secret, store }
    }

    /// Local dotenv files first, then the remote store. Never returns an
    /// empty list.
    pub async fn resolve(&self) -> AnalyzerResult<Credentials> {
        if let Some(path) = self.files.iter().find(|p| p.exists()) {
            let credentials = read_env_file(path)?;
            if !credentials.is_empty() {
                info!(path = %path.display(), count = credentials.len(), "loaded credentials from file");
                return Ok(credentials);
            }
            debug!(path = %path.display(), "credential file has no values");
        }

        debug!(secret = %self.secret.name, region = %self.secret.region, "fetching credentials from secret store");
        let payload = self
            .store
            .fetch_secret(&self.secret.name, &self.secret.region)
            .await?;
        let credentials = parse_secret_payload(&payload)?;

        if credentials.is_empty() {
            return Err(AnalyzerError::NoCredentials {
                searched: self.files.clone(),
            });
        }
        info!(count = credentials.len(), "loaded credentials from secret store");
        Ok(credentials)
    }
}

/// All values of a dotenv file, in file order.
pub fn read_env_file(path: &Path) -> AnalyzerResult<Credentials> {
    let to_io = |e: dotenvy::Error| match e {
        dotenvy::Error::Io(source) => AnalyzerError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => AnalyzerError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, other.to_string()),
        },
    };

    let mut keys = Vec::new();
    for item in dotenvy::from_path_iter(path).map_err(to_io)? {
        let (_, value) = item.map_err(to_io)?;
        keys.push(value);
    }
    Ok(Credentials::new(keys))
}

/// Values of a JSON object, in object order. Non-string values are kept as
/// their JSON text.
pub fn parse_secret_payload(payload: &str) -> AnalyzerResult<Credentials> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| AnalyzerError::SecretPayload(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(AnalyzerError::SecretPayload("expected a JSON object".to_string()));
    };

    let keys = map
        .into_iter()
        .map(|(_, v)| match v {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect();
    Ok(Credentials::new(keys))
}
