//! Utilities for working with Arrow arrays.
//!
//! Column lookup with numeric casting and typed downcasts with clear errors.

use arrow::array::{Array, ArrayRef};
use arrow::compute::kernels::cast::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use log::{debug, warn};

use crate::error::{Result, SynthesisError};

/// True for the integer and floating point Arrow types
#[must_use]
pub const fn is_numeric(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float16
            | DataType::Float32
            | DataType::Float64
    )
}

/// Get a column from a record batch, cast to `expected_type` if needed
///
/// # Arguments
///
/// * `batch` - The record batch containing the column
/// * `column_name` - The name of the column to extract
/// * `expected_type` - The data type the caller will downcast to
/// * `required` - Whether a missing column is an error or `None`
///
/// # Returns
///
/// * `Ok(Some(ArrayRef))` - The column, converted if necessary
/// * `Ok(None)` - The column is absent and not required
/// * `Err` - The column is absent and required, or cannot be converted
pub fn get_column(
    batch: &RecordBatch,
    column_name: &str,
    expected_type: &DataType,
    required: bool,
) -> Result<Option<ArrayRef>> {
    let Ok(idx) = batch.schema().index_of(column_name) else {
        if required {
            return Err(SynthesisError::ColumnNotFound {
                column: column_name.to_string(),
            });
        }
        debug!("Optional column '{column_name}' not found in record batch");
        return Ok(None);
    };

    let column = batch.column(idx);
    let actual_type = column.data_type();
    if actual_type == expected_type {
        return Ok(Some(column.clone()));
    }

    let convertible = (is_numeric(expected_type) && is_numeric(actual_type))
        || (matches!(expected_type, DataType::Utf8)
            && matches!(actual_type, DataType::LargeUtf8 | DataType::Utf8View));
    if !convertible {
        return Err(SynthesisError::Validation(format!(
            "Column '{column_name}' has type {actual_type:?}, expected {expected_type:?}"
        )));
    }

    debug!("Casting column '{column_name}' from {actual_type:?} to {expected_type:?}");
    cast(column, expected_type).map(Some).map_err(|err| {
        warn!("Failed to cast column '{column_name}': {err}");
        SynthesisError::Arrow(err)
    })
}

/// Downcast a column to a concrete array type
///
/// # Type Parameters
///
/// * `A` - The target array type
pub fn downcast_array<'a, A: Array + 'static>(
    array: &'a ArrayRef,
    column_name: &str,
    expected_type_name: &str,
) -> Result<&'a A> {
    array.as_any().downcast_ref::<A>().ok_or_else(|| {
        SynthesisError::Validation(format!(
            "Column '{column_name}' could not be read as {expected_type_name}"
        ))
    })
}

/// Names of every numeric column of a batch, in schema order
#[must_use]
pub fn numeric_column_names(batch: &RecordBatch) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .filter(|f| is_numeric(f.data_type()))
        .map(|f| f.name().clone())
        .collect()
}
