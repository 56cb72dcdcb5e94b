//! State-year panel adapter
//!
//! Every numeric column other than the year becomes a named panel field.

use arrow::record_batch::RecordBatch;

use super::BatchAdapter;
use crate::error::Result;
use crate::models::panel::StateYearRecord;
use crate::utils::arrow::{
    extract_float64_column, extract_int32_column, extract_string_column, numeric_column_names,
};

pub const STATE_COLUMN: &str = "state";
pub const YEAR_COLUMN: &str = "year";

/// Adapter for the state-year panel table
#[derive(Debug, Clone, Copy, Default)]
pub struct PanelBatchAdapter;

impl PanelBatchAdapter {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl BatchAdapter<StateYearRecord> for PanelBatchAdapter {
    fn from_record_batch(&self, batch: &RecordBatch) -> Result<Vec<StateYearRecord>> {
        let states = extract_string_column(batch, STATE_COLUMN, true)?.unwrap_or_default();
        let years = extract_int32_column(batch, YEAR_COLUMN, false)?;

        let mut rows: Vec<Option<StateYearRecord>> = states
            .into_iter()
            .enumerate()
            .map(|(row, state)| {
                state.map(|s| StateYearRecord::new(s, years.as_ref().and_then(|y| y[row])))
            })
            .collect();

        for field in numeric_column_names(batch) {
            if field == YEAR_COLUMN {
                continue;
            }
            let Some(values) = extract_float64_column(batch, &field, false)? else {
                continue;
            };
            for (record, value) in rows.iter_mut().zip(values) {
                if let (Some(record), Some(value)) = (record.as_mut(), value) {
                    record.set(&field, value);
                }
            }
        }

        let skipped = rows.iter().filter(|r| r.is_none()).count();
        if skipped > 0 {
            log::warn!("Skipped {skipped} panel rows without a state name");
        }
        Ok(rows.into_iter().flatten().collect())
    }
}
