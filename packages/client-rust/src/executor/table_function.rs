//! `read_parquet(url)` table function bound to one signed object.

use std::sync::Arc;

use bytes::Bytes;
use datafusion::catalog::{TableFunctionImpl, TableProvider};
use datafusion::common::{plan_err, Result as DFResult, ScalarValue};
use datafusion::datasource::MemTable;
use datafusion::logical_expr::Expr;
use datafusion::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

/// Name under which the table function is registered.
pub const READ_PARQUET: &str = "read_parquet";

/// Serves the decoded signed object to `read_parquet(<url>)` calls.
///
/// Lives in a single-query session; only the URL it was built for resolves.
#[derive(Debug)]
pub struct ReadParquetFunction {
    url: String,
    table: Arc<MemTable>,
}

impl ReadParquetFunction {
    /// Decodes the Parquet `object` fetched from `url` into memory.
    ///
    /// # Errors
    ///
    /// Returns the Parquet or Arrow decode failure.
    pub fn decode(url: impl Into<String>, object: Bytes) -> DFResult<Self> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(object)?;
        let schema = Arc::clone(builder.schema());
        let batches = builder.build()?.collect::<Result<Vec<_>, _>>()?;
        let table = MemTable::try_new(schema, vec![batches])?;
        Ok(Self {
            url: url.into(),
            table: Arc::new(table),
        })
    }

    /// Serves an already materialized table for `url`.
    #[must_use]
    pub fn from_table(url: impl Into<String>, table: MemTable) -> Self {
        Self {
            url: url.into(),
            table: Arc::new(table),
        }
    }
}

impl TableFunctionImpl for ReadParquetFunction {
    fn call(&self, args: &[Expr]) -> DFResult<Arc<dyn TableProvider>> {
        let url = match args {
            [Expr::Literal(
                ScalarValue::Utf8(Some(url))
                | ScalarValue::LargeUtf8(Some(url))
                | ScalarValue::Utf8View(Some(url)),
            )] => url,
            _ => return plan_err!("{READ_PARQUET} expects a single string literal argument"),
        };
        if *url != self.url {
            return plan_err!("{READ_PARQUET} can only read the signed location of this query");
        }
        let table: Arc<dyn TableProvider> = Arc::clone(&self.table) as Arc<dyn TableProvider>;
        Ok(table)
    }
}
