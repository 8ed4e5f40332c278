//! Query executor: runs a SQL template against the signed columnar object.
//!
//! Each call gets its own DataFusion [`SessionContext`]; nothing is pooled or
//! shared between queries. The signed object is fetched into memory, decoded
//! as Parquet, and exposed to the query through `read_parquet(<url>)`. The
//! bytes are dropped when the call returns; nothing is written to disk.

pub mod convert;
pub mod table_function;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use datafusion::prelude::SessionContext;
use tracing::{debug, info};

use specter_core::{bind_location, QueryResult, SignedLocation};

use crate::config::ClientConfig;
use crate::error::ExecutionError;

pub use convert::to_query_result;
pub use table_function::{ReadParquetFunction, READ_PARQUET};

/// Runs a query template against a signed data location.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Binds `location` into `template`, runs it, and returns every row.
    async fn execute(
        &self,
        template: &str,
        location: &SignedLocation,
    ) -> Result<QueryResult, ExecutionError>;
}

/// [`QueryExecutor`] backed by an ephemeral DataFusion session per query.
pub struct DataFusionExecutor {
    http: reqwest::Client,
    query_timeout: Option<Duration>,
    max_object_bytes: u64,
}

impl DataFusionExecutor {
    /// Creates an executor honouring the configured connect, request, and
    /// query timeouts and the object size limit.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Fetch`] if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ExecutionError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeouts.connect {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.timeouts.request {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ExecutionError::Fetch)?;
        Ok(Self::with_client(
            http,
            config.timeouts.query,
            config.max_object_bytes,
        ))
    }

    #[must_use]
    pub fn with_client(
        http: reqwest::Client,
        query_timeout: Option<Duration>,
        max_object_bytes: u64,
    ) -> Self {
        Self {
            http,
            query_timeout,
            max_object_bytes,
        }
    }

    async fn fetch_object(&self, location: &SignedLocation) -> Result<Bytes, ExecutionError> {
        let limit = self.max_object_bytes;
        let mut response = self
            .http
            .get(location.as_str())
            .send()
            .await
            .map_err(ExecutionError::Fetch)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExecutionError::FetchStatus {
                status: status.as_u16(),
            });
        }
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(ExecutionError::ObjectTooLarge { limit });
        }

        let mut object = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(ExecutionError::Fetch)? {
            let total = u64::try_from(object.len() + chunk.len()).unwrap_or(u64::MAX);
            if total > limit {
                return Err(ExecutionError::ObjectTooLarge { limit });
            }
            object.extend_from_slice(&chunk);
        }
        debug!(?location, bytes = object.len(), "fetched data object");
        Ok(object.freeze())
    }

    async fn run(
        &self,
        template: &str,
        location: &SignedLocation,
    ) -> Result<QueryResult, ExecutionError> {
        let object = self.fetch_object(location).await?;
        let function = ReadParquetFunction::decode(location.as_str(), object)
            .map_err(ExecutionError::Open)?;
        run_sql(&bind_location(template, location.as_str()), function).await
    }
}

#[async_trait]
impl QueryExecutor for DataFusionExecutor {
    async fn execute(
        &self,
        template: &str,
        location: &SignedLocation,
    ) -> Result<QueryResult, ExecutionError> {
        let start = Instant::now();
        let result = match self.query_timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(template, location))
                .await
                .map_err(|_elapsed| ExecutionError::Timeout(limit))?,
            None => self.run(template, location).await,
        }?;

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            rows = result.row_count(),
            columns = result.column_names.len(),
            duration_ms,
            "query complete"
        );
        Ok(result)
    }
}

/// Plans and runs `sql` in a fresh session where `read_parquet` resolves
/// through `function`.
///
/// # Errors
///
/// Returns [`ExecutionError::Compile`] for parse/plan failures,
/// [`ExecutionError::Execute`] for runtime failures, and
/// [`ExecutionError::Scan`] if a result cell cannot be read.
pub async fn run_sql(
    sql: &str,
    function: ReadParquetFunction,
) -> Result<QueryResult, ExecutionError> {
    let ctx = SessionContext::new();
    ctx.register_udtf(READ_PARQUET, Arc::new(function));

    let df = ctx.sql(sql).await.map_err(ExecutionError::Compile)?;
    let column_names = df
        .schema()
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .collect();
    let batches = df.collect().await.map_err(ExecutionError::Execute)?;
    to_query_result(column_names, &batches)
}
