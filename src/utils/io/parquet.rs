//! Parquet file operations
//!
//! Reading single files or whole directories of Parquet files into Arrow
//! record batches, and writing record batches back out.

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use rayon::prelude::*;

use crate::error::util::{safe_create_file, validate_directory};
use crate::error::{Result, SynthesisError};
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

/// Default batch size for Parquet reading
pub const DEFAULT_BATCH_SIZE: usize = 16384;

/// Batch size from the `PARQUET_BATCH_SIZE` environment variable, if set
#[must_use]
pub fn get_batch_size() -> Option<usize> {
    std::env::var("PARQUET_BATCH_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
}

/// Read a parquet file into Arrow record batches
///
/// # Errors
/// Returns an error if the file cannot be opened or is not valid Parquet
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>> {
    let start = std::time::Instant::now();
    log_operation_start("Reading parquet file", path);

    let file = File::open(path)
        .map_err(|e| SynthesisError::io(format!("Failed to open {}", path.display()), e))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
        .with_batch_size(get_batch_size().unwrap_or(DEFAULT_BATCH_SIZE))
        .build()?;

    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;

    log_operation_complete("read", path, batches.len(), Some(start.elapsed()));
    Ok(batches)
}

/// Find all Parquet files in a directory, sorted by name
///
/// # Errors
/// Returns an error if the directory cannot be read
pub fn find_parquet_files(dir: &Path) -> Result<Vec<PathBuf>> {
    log_operation_start("Searching for parquet files in", dir);
    validate_directory(dir, "parquet input")?;

    let parquet_files = std::fs::read_dir(dir)
        .map_err(|e| SynthesisError::io(format!("Failed to read directory {}", dir.display()), e))?
        .map(|entry| entry.map(|e| e.path()).map_err(SynthesisError::from))
        .filter_ok(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "parquet"))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .sorted()
        .collect_vec();

    if parquet_files.is_empty() {
        log_warning("No Parquet files found in directory", Some(dir));
    } else {
        log_operation_complete("found", dir, parquet_files.len(), None);
    }
    Ok(parquet_files)
}

/// Load all parquet files from a directory in parallel
///
/// Batches keep the file order of [`find_parquet_files`].
pub fn load_parquet_files_parallel(dir: &Path) -> Result<Vec<RecordBatch>> {
    let parquet_files = find_parquet_files(dir)?;
    if parquet_files.is_empty() {
        return Ok(Vec::new());
    }

    let per_file: Vec<Result<Vec<RecordBatch>>> =
        parquet_files.par_iter().map(|path| read_parquet(path)).collect();

    let mut combined = Vec::new();
    for batches in per_file {
        combined.extend(batches?);
    }

    log::info!(
        "Successfully loaded {} batches from {} Parquet files",
        combined.len(),
        parquet_files.len()
    );
    Ok(combined)
}

/// Read a Parquet file, or every Parquet file of a directory
pub fn read_parquet_path(path: &Path) -> Result<Vec<RecordBatch>> {
    if path.is_dir() {
        load_parquet_files_parallel(path)
    } else {
        read_parquet(path)
    }
}

/// Write record batches sharing one schema to a Parquet file
///
/// # Errors
/// Returns an error if `batches` is empty or the file cannot be written
pub fn write_parquet(path: &Path, batches: &[RecordBatch]) -> Result<()> {
    let Some(first) = batches.first() else {
        return Err(SynthesisError::Validation(format!(
            "No record batches to write to {}",
            path.display()
        )));
    };
    let file = safe_create_file(path, "parquet output")?;
    let mut writer = ArrowWriter::try_new(file, first.schema(), None)?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.close()?;
    log_operation_complete("wrote", path, batches.len(), None);
    Ok(())
}
