//! The query pipeline: predicates → signed location → query → sink.
//!
//! Each invocation runs its stages strictly in sequence and holds no state
//! across invocations. Signed locations are fetched per query and dropped
//! right after it. Batch monitor runs stop at the first failure.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, info_span, Instrument};

use specter_core::catalog::{self, MonitorQuery};
use specter_core::sql::search_query;
use specter_core::{build_predicates, LocationRequest, SearchFilters, MONITOR_QUERIES};

use crate::broker::LocationBroker;
use crate::config::ClientConfig;
use crate::error::{PipelineError, ValidationError};
use crate::executor::QueryExecutor;
use crate::sink::{ResultSink, SinkOutcome};

/// Wires the broker, executor, and sink together.
pub struct Pipeline<W: Write> {
    config: ClientConfig,
    broker: Arc<dyn LocationBroker>,
    executor: Arc<dyn QueryExecutor>,
    sink: ResultSink<W>,
    catalog: &'static [MonitorQuery],
}

impl<W: Write> Pipeline<W> {
    /// Creates a pipeline over the built-in monitoring catalog.
    pub fn new(
        config: ClientConfig,
        broker: Arc<dyn LocationBroker>,
        executor: Arc<dyn QueryExecutor>,
        out: W,
    ) -> Self {
        Self {
            config,
            broker,
            executor,
            sink: ResultSink::new(out),
            catalog: MONITOR_QUERIES,
        }
    }

    /// Replaces the monitoring catalog.
    #[must_use]
    pub fn with_catalog(mut self, catalog: &'static [MonitorQuery]) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &'static [MonitorQuery] {
        self.catalog
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the sink's output stream.
    pub fn into_output(self) -> W {
        self.sink.into_inner()
    }

    /// Runs an ad-hoc search over the audit log.
    ///
    /// The filters are sent to the exchange as predicate hints and also form
    /// the query's `WHERE` clause.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NoFilters`] before any network call when no
    /// filter has a value; otherwise the first failing stage's error.
    pub async fn search(
        &mut self,
        filters: &SearchFilters,
        export_base: Option<&str>,
    ) -> Result<SinkOutcome, PipelineError> {
        let predicates = build_predicates(filters);
        if predicates.is_empty() {
            return Err(ValidationError::NoFilters.into());
        }

        let sql = search_query(&predicates.where_clause());
        let request =
            LocationRequest::filtered(self.config.scope.clone(), predicates, self.config.limit_hint);
        self.run_query("search", request, &sql, export_base).await
    }

    /// Runs monitoring query `index` (1-based), or all of them for `0`.
    ///
    /// In a batch run every query gets its own export file,
    /// `<base>_<query name>.csv`. The batch stops at the first failure and
    /// later queries are not attempted.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an out-of-range index, otherwise the
    /// first failing query's error.
    pub async fn monitor(
        &mut self,
        index: usize,
        export_base: Option<&str>,
    ) -> Result<Vec<SinkOutcome>, PipelineError> {
        let queries = catalog::select(self.catalog, index)?;
        let batch = queries.len() > 1;

        let mut outcomes = Vec::with_capacity(queries.len());
        for query in queries {
            let export = export_base.map(|base| {
                if batch {
                    format!("{base}_{}", query.name)
                } else {
                    base.to_string()
                }
            });
            let request =
                LocationRequest::unfiltered(self.config.scope.clone(), self.config.limit_hint);
            let outcome = self
                .run_query(query.name, request, query.sql, export.as_deref())
                .await?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn run_query(
        &mut self,
        name: &str,
        request: LocationRequest,
        template: &str,
        export_base: Option<&str>,
    ) -> Result<SinkOutcome, PipelineError> {
        let span = info_span!(
            "query",
            query = name,
            scope = %request.scope,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );
        let start = Instant::now();

        let broker = Arc::clone(&self.broker);
        let executor = Arc::clone(&self.executor);
        let result = async move {
            let location = broker.fetch_signed_url(&request).await?;
            info!(elapsed_ms = elapsed_ms(start), "signed location obtained");
            let result = executor.execute(template, &location).await?;
            drop(location);
            Ok::<_, PipelineError>(result)
        }
        .instrument(span.clone())
        .await;

        let _entered = span.enter();
        let outcome = result.and_then(|result| {
            self.sink
                .deliver(&result, export_base)
                .map_err(PipelineError::from)
        });
        span.record("duration_ms", elapsed_ms(start));
        span.record("outcome", if outcome.is_ok() { "ok" } else { "error" });
        outcome
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
