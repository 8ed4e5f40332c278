//! Fully materialized query result.

use serde::{Deserialize, Serialize};

use crate::value::CellValue;

/// Column names plus every row of a query, held in memory.
///
/// Produced once per query and consumed once by a result sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub column_names: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl QueryResult {
    #[must_use]
    pub fn new(column_names: Vec<String>) -> Self {
        Self {
            column_names,
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates `(column, value)` pairs of each row.
    pub fn labelled_rows(&self) -> impl Iterator<Item = Vec<(&str, &CellValue)>> + '_ {
        self.rows.iter().map(move |row| {
            self.column_names
                .iter()
                .map(String::as_str)
                .zip(row.iter())
                .collect()
        })
    }
}
