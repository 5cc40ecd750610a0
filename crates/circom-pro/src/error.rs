//! Orchestrator errors

use std::path::PathBuf;

use thiserror::Error;

/// Orchestrator result type
pub type Result<T> = std::result::Result<T, Error>;

/// Orchestrator errors
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown circuit: {0}")]
    UnknownCircuit(String),

    #[error("project manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    #[error("invalid project manifest {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("no {tag} data found in {path}")]
    FixtureMissing { tag: &'static str, path: PathBuf },

    #[error("invalid {tag} data in {path}: {source}")]
    FixtureInvalid {
        tag: &'static str,
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Backend(#[from] BackendFailure),
}

/// Failure reported by the external circuit toolchain.
///
/// `operator` classifies the failing phase (compile, witness, prove,
/// verify); `message` is the raw toolchain output and may embed ANSI
/// escapes and a formatted `error[CODE]:` report. See
/// [`crate::diagnostics::map_backend_failure`] for the scrape.
#[derive(Debug, Clone, Error)]
#[error("{operator} - {message}")]
pub struct BackendFailure {
    pub operator: String,
    pub message: String,
}

impl BackendFailure {
    pub fn new(operator: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operator: operator.into(),
            message: message.into(),
        }
    }
}
