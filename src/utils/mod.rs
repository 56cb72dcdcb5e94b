//! Utilities for Arrow data, file IO and logging

pub mod arrow;
pub mod io;
pub mod logging;

pub use io::{export_report, read_parquet_path};
