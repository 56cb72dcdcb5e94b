//! Column extraction utilities for Arrow record batches
//!
//! Each extractor returns one `Option` per row so adapters can walk rows
//! without repeating the lookup and cast for every cell.

use arrow::array::{Array, Float64Array, Int32Array, StringArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;

use crate::error::Result;
use crate::utils::arrow::array_utils::{downcast_array, get_column};

/// Extract a string column; empty strings and nulls become `None`
///
/// # Returns
///
/// * `Ok(Some(values))` - One entry per row
/// * `Ok(None)` - The column is absent and not required
pub fn extract_string_column(
    batch: &RecordBatch,
    column_name: &str,
    required: bool,
) -> Result<Option<Vec<Option<String>>>> {
    let Some(array) = get_column(batch, column_name, &DataType::Utf8, required)? else {
        return Ok(None);
    };
    let strings = downcast_array::<StringArray>(&array, column_name, "String")?;
    Ok(Some(
        (0..strings.len())
            .map(|row| {
                (!strings.is_null(row))
                    .then(|| strings.value(row).trim())
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            })
            .collect(),
    ))
}

/// Extract a numeric column as `f64`; nulls and non-finite values become `None`
pub fn extract_float64_column(
    batch: &RecordBatch,
    column_name: &str,
    required: bool,
) -> Result<Option<Vec<Option<f64>>>> {
    let Some(array) = get_column(batch, column_name, &DataType::Float64, required)? else {
        return Ok(None);
    };
    let floats = downcast_array::<Float64Array>(&array, column_name, "Float64")?;
    Ok(Some(
        (0..floats.len())
            .map(|row| {
                (!floats.is_null(row))
                    .then(|| floats.value(row))
                    .filter(|v| v.is_finite())
            })
            .collect(),
    ))
}

/// Extract an integer column as `i32`
pub fn extract_int32_column(
    batch: &RecordBatch,
    column_name: &str,
    required: bool,
) -> Result<Option<Vec<Option<i32>>>> {
    let Some(array) = get_column(batch, column_name, &DataType::Int32, required)? else {
        return Ok(None);
    };
    let ints = downcast_array::<Int32Array>(&array, column_name, "Int32")?;
    Ok(Some(
        (0..ints.len())
            .map(|row| (!ints.is_null(row)).then(|| ints.value(row)))
            .collect(),
    ))
}
