//! Result sink: interactive block rendering or CSV export.
//!
//! Both modes render cells through [`format_cell`], so nested values read the
//! same on screen and in the exported file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::csv::WriterBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use tracing::info;

use specter_core::{format_cell, QueryResult};

use crate::error::ExportError;

/// Separator printed before the first row block and after each row.
pub const ROW_SEPARATOR: &str = "------";

/// Extension appended to export base names.
pub const EXPORT_EXTENSION: &str = "csv";

/// What the sink did with a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    Rendered { rows: usize },
    Exported { path: PathBuf, rows: usize },
}

/// Delivers query results to an output stream or an export file.
pub struct ResultSink<W: Write> {
    out: W,
}

impl<W: Write> ResultSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the underlying output stream.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Renders `result` to the output stream, or exports it to
    /// `<export_base>.csv` when a base name is given.
    ///
    /// The export file is closed on every path. A failed export does not
    /// fall back to rendering.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] if the file cannot be created, written, or
    /// flushed, or if the output stream rejects a write.
    pub fn deliver(
        &mut self,
        result: &QueryResult,
        export_base: Option<&str>,
    ) -> Result<SinkOutcome, ExportError> {
        match export_base {
            Some(base) => {
                let path = export_path(base);
                export_csv(result, &path)?;
                info!(path = %path.display(), rows = result.row_count(), "results exported");
                writeln!(self.out, "Results exported to {}", path.display())
                    .map_err(ExportError::Output)?;
                Ok(SinkOutcome::Exported {
                    path,
                    rows: result.row_count(),
                })
            }
            None => {
                render_blocks(&mut self.out, result).map_err(ExportError::Output)?;
                Ok(SinkOutcome::Rendered {
                    rows: result.row_count(),
                })
            }
        }
    }
}

/// `<base>.csv`.
#[must_use]
pub fn export_path(base: &str) -> PathBuf {
    PathBuf::from(format!("{base}.{EXPORT_EXTENSION}"))
}

/// Writes one `column: value` line per cell, with [`ROW_SEPARATOR`] lines
/// framing each row.
///
/// # Errors
///
/// Propagates write failures of `out`.
pub fn render_blocks(out: &mut impl Write, result: &QueryResult) -> std::io::Result<()> {
    writeln!(out, "{ROW_SEPARATOR}")?;
    for row in result.labelled_rows() {
        for (column, value) in row {
            writeln!(out, "{column}: {}", format_cell(value))?;
        }
        writeln!(out, "{ROW_SEPARATOR}")?;
    }
    out.flush()
}

/// Writes a header row and one formatted row per result row to `path`.
///
/// # Errors
///
/// Returns [`ExportError::Create`], [`ExportError::Write`], or
/// [`ExportError::Flush`] for the corresponding failure.
pub fn export_csv(result: &QueryResult, path: &Path) -> Result<(), ExportError> {
    let write_err = |source: ArrowError| ExportError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(|source| ExportError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let batch = formatted_batch(result).map_err(write_err)?;

    let mut writer = WriterBuilder::new()
        .with_header(true)
        .build(BufWriter::new(file));
    writer.write(&batch).map_err(write_err)?;
    writer
        .into_inner()
        .flush()
        .map_err(|source| ExportError::Flush {
            path: path.to_path_buf(),
            source,
        })
}

/// All-text batch of formatted cells, one `Utf8` column per result column.
fn formatted_batch(result: &QueryResult) -> Result<RecordBatch, ArrowError> {
    let fields: Vec<Field> = result
        .column_names
        .iter()
        .map(|name| Field::new(name, DataType::Utf8, false))
        .collect();
    let columns: Vec<ArrayRef> = (0..result.column_names.len())
        .map(|idx| {
            let cells: StringArray = result
                .rows
                .iter()
                .map(|row| Some(row.get(idx).map(format_cell).unwrap_or_default()))
                .collect();
            Arc::new(cells) as ArrayRef
        })
        .collect();
    let options = RecordBatchOptions::new().with_row_count(Some(result.row_count()));
    RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), columns, &options)
}
