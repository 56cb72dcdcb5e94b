//! Arrow data handling utilities
//!
//! Helpers for locating, casting and extracting record batch columns.

pub mod array_utils;
pub mod extractors;

pub use array_utils::{downcast_array, get_column, is_numeric, numeric_column_names};
pub use extractors::{extract_float64_column, extract_int32_column, extract_string_column};
