//! Logging utilities for output and progress tracking

pub mod console;
pub mod log;
pub mod progress;

pub use log::{log_operation_complete, log_operation_start, log_stage_complete, log_warning};
pub use progress::{CHAIN_TEMPLATE, chain_progress_bars};
