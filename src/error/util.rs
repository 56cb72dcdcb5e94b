//! Utility functions for error handling
//!
//! File helpers that attach the purpose of an operation to IO failures, so
//! export errors say which table could not be written.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{Result, SynthesisError};

/// Create (or truncate) a file for writing with rich error information
///
/// # Arguments
/// * `path` - The path of the file to create
/// * `purpose` - What the file is for (for error context)
pub fn safe_create_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                SynthesisError::io(
                    format!("Failed to create directory {} for {purpose}", parent.display()),
                    e,
                )
            })?;
        }
    }

    fs::File::create(path).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::PermissionDenied => {
                format!("Permission denied creating {} for {purpose}", path.display())
            }
            _ => format!("Failed to create {} for {purpose}", path.display()),
        };
        SynthesisError::io(context, e)
    })
}

/// Check that a directory exists and is readable, with rich error information
pub fn validate_directory(path: &Path, purpose: &str) -> Result<()> {
    if !path.exists() {
        return Err(SynthesisError::io(
            format!("Directory not found: {} (needed for {purpose})", path.display()),
            io::Error::from(io::ErrorKind::NotFound),
        ));
    }

    if !path.is_dir() {
        return Err(SynthesisError::Validation(format!(
            "Path is not a directory: {} (expected a directory for {purpose})",
            path.display()
        )));
    }

    fs::read_dir(path).map(|_| ()).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::PermissionDenied => {
                format!("Permission denied - check directory permissions of {}", path.display())
            }
            _ => format!("Failed to access directory {} for {purpose}", path.display()),
        };
        SynthesisError::io(context, e)
    })
}
