//! Arrow record batches to [`QueryResult`] cells.

use datafusion::arrow::array::{Array, AsArray};
use datafusion::arrow::datatypes::DataType;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::arrow::util::display::array_value_to_string;
use datafusion::common::{Result as DFResult, ScalarValue};
use specter_core::{CellValue, QueryResult};

use crate::error::ExecutionError;

/// Materializes every row of `batches` under `column_names`.
///
/// # Errors
///
/// Returns [`ExecutionError::Scan`] naming the column whose cell could not be
/// read.
pub fn to_query_result(
    column_names: Vec<String>,
    batches: &[RecordBatch],
) -> Result<QueryResult, ExecutionError> {
    let mut result = QueryResult::new(column_names);
    for batch in batches {
        for row in 0..batch.num_rows() {
            let mut cells = Vec::with_capacity(batch.num_columns());
            for (idx, column) in batch.columns().iter().enumerate() {
                let cell = cell_at(column.as_ref(), row).map_err(|source| ExecutionError::Scan {
                    column: batch.schema().field(idx).name().clone(),
                    source,
                })?;
                cells.push(cell);
            }
            result.rows.push(cells);
        }
    }
    Ok(result)
}

/// Reads one cell, keeping struct, map, and list values nested.
///
/// # Errors
///
/// Propagates Arrow failures reading the value or its children.
pub fn cell_at(array: &dyn Array, row: usize) -> DFResult<CellValue> {
    if array.is_null(row) {
        return Ok(CellValue::Null);
    }

    match array.data_type() {
        DataType::Struct(_) => {
            let array = array.as_struct();
            let mut entries = Vec::with_capacity(array.num_columns());
            for (field, column) in array.fields().iter().zip(array.columns()) {
                entries.push((field.name().clone(), cell_at(column.as_ref(), row)?));
            }
            Ok(CellValue::Map(entries))
        }
        DataType::Map(..) => {
            let pairs = array.as_map().value(row);
            let mut entries = Vec::with_capacity(pairs.len());
            for i in 0..pairs.len() {
                let key = cell_at(pairs.column(0).as_ref(), i)?.to_string();
                entries.push((key, cell_at(pairs.column(1).as_ref(), i)?));
            }
            Ok(CellValue::Map(entries))
        }
        DataType::List(_) => list_cell(array.as_list::<i32>().value(row).as_ref()),
        DataType::LargeList(_) => list_cell(array.as_list::<i64>().value(row).as_ref()),
        DataType::FixedSizeList(..) => list_cell(array.as_fixed_size_list().value(row).as_ref()),
        _ => scalar_cell(array, row),
    }
}

fn list_cell(values: &dyn Array) -> DFResult<CellValue> {
    let mut items = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        items.push(cell_at(values, i)?);
    }
    Ok(CellValue::List(items))
}

fn scalar_cell(array: &dyn Array, row: usize) -> DFResult<CellValue> {
    let cell = match ScalarValue::try_from_array(array, row)? {
        ScalarValue::Boolean(Some(v)) => CellValue::Bool(v),
        ScalarValue::Int8(Some(v)) => CellValue::Int(i64::from(v)),
        ScalarValue::Int16(Some(v)) => CellValue::Int(i64::from(v)),
        ScalarValue::Int32(Some(v)) => CellValue::Int(i64::from(v)),
        ScalarValue::Int64(Some(v)) => CellValue::Int(v),
        ScalarValue::UInt8(Some(v)) => CellValue::UInt(u64::from(v)),
        ScalarValue::UInt16(Some(v)) => CellValue::UInt(u64::from(v)),
        ScalarValue::UInt32(Some(v)) => CellValue::UInt(u64::from(v)),
        ScalarValue::UInt64(Some(v)) => CellValue::UInt(v),
        ScalarValue::Float32(Some(v)) => CellValue::Float(f64::from(v)),
        ScalarValue::Float64(Some(v)) => CellValue::Float(v),
        ScalarValue::Utf8(Some(v))
        | ScalarValue::LargeUtf8(Some(v))
        | ScalarValue::Utf8View(Some(v)) => CellValue::String(v),
        ScalarValue::Binary(Some(v))
        | ScalarValue::LargeBinary(Some(v))
        | ScalarValue::BinaryView(Some(v))
        | ScalarValue::FixedSizeBinary(_, Some(v)) => CellValue::Bytes(v),
        // Temporal, decimal, interval, and dictionary values keep Arrow's
        // display form.
        _ => CellValue::String(array_value_to_string(array, row)?),
    };
    Ok(cell)
}
