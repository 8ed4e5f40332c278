//! Typed result cells and their human-readable rendering.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Rendering of a SQL `NULL` cell.
pub const NULL_DISPLAY: &str = "<nil>";

/// A single cell of a query result.
///
/// Scalars keep their type; nested structures (struct and map columns) are
/// kept as key/value entries and lists as sequences. Nothing is flattened
/// until the cell is rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// UTF-8 text, and any scalar the engine only exposes through its textual
    /// form (timestamps, dates, decimals, intervals).
    String(String),
    Bytes(Vec<u8>),
    List(Vec<CellValue>),
    /// Key/value entries of a struct or map cell, in engine order.
    Map(Vec<(String, CellValue)>),
}

impl CellValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

/// Human-readable rendering shared by interactive display and file export.
///
/// Map-like cells flatten to `key: value` pairs joined by `, `; lists render
/// as `[a, b]`.
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => f.write_str(NULL_DISPLAY),
            CellValue::Bool(v) => write!(f, "{v}"),
            CellValue::Int(v) => write!(f, "{v}"),
            CellValue::UInt(v) => write!(f, "{v}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::String(v) => f.write_str(v),
            CellValue::Bytes(bytes) => {
                f.write_str("0x")?;
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            CellValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            CellValue::Map(entries) => {
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                Ok(())
            }
        }
    }
}

/// Renders a cell for display or export.
#[must_use]
pub fn format_cell(value: &CellValue) -> String {
    value.to_string()
}
