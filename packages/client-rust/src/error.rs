//! Error taxonomy of the query pipeline.
//!
//! Every stage has its own error type; [`PipelineError`] wraps them so the
//! operator sees a single line naming the failing stage. Nothing is retried.

use std::path::PathBuf;
use std::time::Duration;

use datafusion::error::DataFusionError;
use specter_core::{CatalogError, ConfigError};

/// Request rejected before any network call.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("at least one search filter must be provided")]
    NoFilters,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Failures of the credential-vending exchange.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid sharing endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("exchange timed out: {0}")]
    Timeout(#[source] reqwest::Error),
    #[error("sharing server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("no pre-signed URL found in response")]
    NoLocationFound,
}

impl From<reqwest::Error> for BrokerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BrokerError::Timeout(err)
        } else {
            BrokerError::Transport(err)
        }
    }
}

/// Failures while running a query against the signed object.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("failed to fetch data object: {0}")]
    Fetch(#[source] reqwest::Error),
    #[error("data object request returned {status}")]
    FetchStatus { status: u16 },
    #[error("data object exceeds the {limit}-byte limit")]
    ObjectTooLarge { limit: u64 },
    #[error("failed to open data object: {0}")]
    Open(#[source] DataFusionError),
    #[error("failed to compile query: {0}")]
    Compile(#[source] DataFusionError),
    #[error("failed to execute query: {0}")]
    Execute(#[source] DataFusionError),
    #[error("failed to scan column `{column}`: {source}")]
    Scan {
        column: String,
        #[source]
        source: DataFusionError,
    },
    #[error("query did not finish within {0:?}")]
    Timeout(Duration),
}

impl ExecutionError {
    /// Engine stage the failure belongs to.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            ExecutionError::Fetch(_)
            | ExecutionError::FetchStatus { .. }
            | ExecutionError::ObjectTooLarge { .. } => "fetch",
            ExecutionError::Open(_) => "open",
            ExecutionError::Compile(_) => "compile",
            ExecutionError::Execute(_) => "execute",
            ExecutionError::Scan { .. } => "scan",
            ExecutionError::Timeout(_) => "timeout",
        }
    }
}

/// Failures while writing an export file.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: arrow::error::ArrowError,
    },
    #[error("failed to flush {path}: {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write results to output: {0}")]
    Output(#[source] std::io::Error),
}

/// Any fatal pipeline failure, tagged with its stage.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("broker error: {0}")]
    Broker(BrokerError),
    #[error("execution error ({stage}): {0}", stage = .0.stage())]
    Execution(#[from] ExecutionError),
    #[error("export error: {0}")]
    Export(#[from] ExportError),
}

impl From<BrokerError> for PipelineError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::Config(inner) => PipelineError::Config(inner),
            other => PipelineError::Broker(other),
        }
    }
}

impl From<CatalogError> for PipelineError {
    fn from(err: CatalogError) -> Self {
        PipelineError::Validation(err.into())
    }
}
