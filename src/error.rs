use std::path::PathBuf;
use thiserror::Error;

/// Failures that stop an analysis before any model is called.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("no API credentials found in {searched:?} or the remote secret store")]
    NoCredentials { searched: Vec<PathBuf> },

    #[error("secret store error: {0}")]
    SecretStore(String),

    #[error("secret payload is not a JSON object of credentials: {0}")]
    SecretPayload(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type AnalyzerResult<T> = Result<T, AnalyzerError>;
