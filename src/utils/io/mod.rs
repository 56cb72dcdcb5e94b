//! IO utilities: Parquet input, CSV and JSON output

pub mod csv;
pub mod json;
pub mod parquet;

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::pipeline::SynthesisReport;

pub use csv::{escape_csv, write_report_tables};
pub use json::{write_report_json, write_state_profiles};
pub use parquet::{find_parquet_files, load_parquet_files_parallel, read_parquet, read_parquet_path};

/// Write every table, the state profiles and the full report into `dir`
pub fn export_report(report: &SynthesisReport, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = write_report_tables(report, dir)?;
    let profiles = dir.join("state_delay_profiles.json");
    write_state_profiles(report, &profiles)?;
    written.push(profiles);
    let full = dir.join("synthesis_report.json");
    write_report_json(report, &full)?;
    written.push(full);
    Ok(written)
}
