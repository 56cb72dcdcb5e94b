//! Record-batch-to-model adapters
//!
//! Adapters turn Arrow record batches produced by the ingestion side into
//! the domain models the engine reads. Each adapter implements
//! [`BatchAdapter`] for one model type.

use arrow::record_batch::RecordBatch;

use crate::error::Result;

pub mod delay;
pub mod panel;

pub use delay::DelayBatchAdapter;
pub use panel::PanelBatchAdapter;

/// Conversion of record batches into domain models
pub trait BatchAdapter<T> {
    /// Convert one record batch
    fn from_record_batch(&self, batch: &RecordBatch) -> Result<Vec<T>>;

    /// Convert several record batches, concatenating the results in order
    fn from_record_batches(&self, batches: &[RecordBatch]) -> Result<Vec<T>> {
        let mut models = Vec::new();
        for batch in batches {
            models.extend(self.from_record_batch(batch)?);
        }
        Ok(models)
    }
}
