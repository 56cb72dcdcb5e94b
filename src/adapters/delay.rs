//! Literature-extraction adapter
//!
//! The extraction table is wide: one row per study, with up to four delay
//! categories side by side (`patient_delay_days`, `patient_delay_se`,
//! `patient_delay_sd`, ...). Each non-null `<category>_delay_days` cell
//! becomes one [`RawDelayRecord`].

use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use log::debug;

use super::BatchAdapter;
use crate::error::{Result, SynthesisError};
use crate::models::delay::{DelayCategory, RawDelayRecord};
use crate::utils::arrow::{
    extract_float64_column, extract_int32_column, extract_string_column, is_numeric,
};

/// Column holding the study identifier
pub const STUDY_ID_COLUMN: &str = "pmid";
pub const STATE_COLUMN: &str = "state";
pub const YEAR_COLUMN: &str = "study_year";
pub const SAMPLE_SIZE_COLUMN: &str = "sample_size";

/// Adapter for the wide delay extraction layout
#[derive(Debug, Clone, Copy, Default)]
pub struct DelayBatchAdapter;

impl DelayBatchAdapter {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Study identifiers; numeric PMIDs are rendered without decimals and
    /// rows without one are named by position
    fn study_ids(batch: &RecordBatch) -> Result<Vec<String>> {
        let rows = batch.num_rows();
        let numeric = batch
            .schema()
            .field_with_name(STUDY_ID_COLUMN)
            .is_ok_and(|f| is_numeric(f.data_type()));

        let ids: Vec<Option<String>> = if numeric {
            extract_float64_column(batch, STUDY_ID_COLUMN, true)?
                .unwrap_or_default()
                .into_iter()
                .map(|v| v.map(|id| format!("{id:.0}")))
                .collect()
        } else {
            extract_string_column(batch, STUDY_ID_COLUMN, false)?
                .unwrap_or_else(|| vec![None; rows])
        };

        Ok(ids
            .into_iter()
            .enumerate()
            .map(|(row, id)| id.unwrap_or_else(|| format!("row-{row}")))
            .collect())
    }
}

impl BatchAdapter<RawDelayRecord> for DelayBatchAdapter {
    fn from_record_batch(&self, batch: &RecordBatch) -> Result<Vec<RawDelayRecord>> {
        let rows = batch.num_rows();
        let schema = batch.schema();

        let present: Vec<DelayCategory> = DelayCategory::ALL
            .into_iter()
            .filter(|c| schema.index_of(&format!("{}_days", c.column_prefix())).is_ok())
            .collect();
        if present.is_empty() {
            return Err(SynthesisError::ColumnNotFound {
                column: "<category>_delay_days".to_string(),
            });
        }

        let ids = Self::study_ids(batch)?;
        let states = extract_string_column(batch, STATE_COLUMN, false)?;
        let years = if schema
            .field_with_name(YEAR_COLUMN)
            .is_ok_and(|f| f.data_type() != &DataType::Utf8)
        {
            extract_int32_column(batch, YEAR_COLUMN, false)?
        } else {
            extract_string_column(batch, YEAR_COLUMN, false)?.map(|years| {
                years
                    .into_iter()
                    .map(|y| y.and_then(|s| s.parse::<i32>().ok()))
                    .collect()
            })
        };
        let sample_sizes = extract_float64_column(batch, SAMPLE_SIZE_COLUMN, false)?;

        let mut records = Vec::new();
        for category in present {
            let prefix = category.column_prefix();
            let effects = extract_float64_column(batch, &format!("{prefix}_days"), true)?
                .unwrap_or_default();
            let ses = extract_float64_column(batch, &format!("{prefix}_se"), false)?;
            let sds = extract_float64_column(batch, &format!("{prefix}_sd"), false)?;

            for row in 0..rows {
                let Some(effect) = effects.get(row).copied().flatten() else {
                    continue;
                };
                let cell = |column: &Option<Vec<Option<f64>>>| {
                    column.as_ref().and_then(|values| values[row])
                };
                records.push(RawDelayRecord {
                    category,
                    effect,
                    standard_error: cell(&ses),
                    standard_deviation: cell(&sds),
                    sample_size: cell(&sample_sizes),
                    study_id: ids[row].clone(),
                    state: states.as_ref().and_then(|s| s[row].clone()),
                    year: years.as_ref().and_then(|y| y[row]),
                });
            }
        }

        debug!(
            "Extracted {} delay records from a batch of {rows} studies",
            records.len()
        );
        Ok(records)
    }
}
