//! Logging helpers
//!
//! Consistent messages for file operations and pipeline stages.

use std::path::Path;
use std::time::Duration;

/// Log the start of a file operation
pub fn log_operation_start(operation: &str, path: &Path) {
    log::info!("{} {}", operation, path.display());
}

/// Log the completion of a file operation
///
/// # Arguments
/// * `operation` - Past-tense verb, e.g. `read` or `wrote`
/// * `path` - File or directory operated on
/// * `items` - Number of batches, files or rows handled
/// * `elapsed` - Optional elapsed time
pub fn log_operation_complete(operation: &str, path: &Path, items: usize, elapsed: Option<Duration>) {
    match elapsed {
        Some(duration) => log::info!(
            "Successfully {operation} {items} items at {} in {duration:?}",
            path.display()
        ),
        None => log::info!("Successfully {operation} {items} items at {}", path.display()),
    }
}

/// Log a warning, optionally tied to a path
pub fn log_warning(message: &str, path: Option<&Path>) {
    match path {
        Some(path) => log::warn!("{message}: {}", path.display()),
        None => log::warn!("{message}"),
    }
}

/// Log the completion of a pipeline stage
pub fn log_stage_complete(stage: &str, detail: &str, elapsed: Duration) {
    log::info!("[{stage}] {detail} ({elapsed:.2?})");
}
