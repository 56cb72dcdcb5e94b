//! Error handling for the evidence-synthesis engine.

pub mod util;

use std::io;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use thiserror::Error;

use crate::models::delay::DelayCategory;

/// Specialized error type for the synthesis engine
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Too few studies or states to compute a meaningful statistic
    #[error("Insufficient data for {stage}: {detail}")]
    InsufficientData { stage: String, detail: String },

    /// MCMC diagnostics failed their thresholds
    #[error(
        "Sampler did not converge for {category}: max R-hat {max_r_hat:.3} (limit {r_hat_limit}), min ESS {min_ess:.0} (required {ess_required})"
    )]
    Convergence {
        category: DelayCategory,
        max_r_hat: f64,
        r_hat_limit: f64,
        min_ess: f64,
        ess_required: f64,
    },

    /// The causal edge set contains a cycle
    #[error("Causal edge set is not acyclic: cycle through '{node}'")]
    CyclicGraph { node: String },

    /// A required panel field is absent for every state
    #[error("Required panel field '{field}' is missing for all states")]
    MissingFeature { field: String },

    /// The probabilistic backend cannot be used in this build
    #[error("Bayesian backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Malformed input or arguments
    #[error("Validation error: {0}")]
    Validation(String),

    /// A column needed by an adapter is missing from a record batch
    #[error("Column '{column}' not found in record batch")]
    ColumnNotFound { column: String },

    /// Error opening, reading, or writing a file
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Error processing Arrow data
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error processing Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Error serializing JSON output
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<io::Error> for SynthesisError {
    fn from(error: io::Error) -> Self {
        Self::Io {
            context: error.kind().to_string(),
            source: error,
        }
    }
}

impl SynthesisError {
    /// Shorthand for an [`SynthesisError::InsufficientData`] error
    pub fn insufficient(stage: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InsufficientData {
            stage: stage.into(),
            detail: detail.into(),
        }
    }

    /// Wrap an IO error with a description of what was being attempted
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether the pipeline can continue after this error by falling back
    /// or skipping an optional stage.
    ///
    /// Structural violations (cycles, required fields, malformed input) are
    /// not recoverable and must be fixed by the caller.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData { .. } | Self::Convergence { .. } | Self::BackendUnavailable(_)
        )
    }
}

/// Result type for synthesis operations
pub type Result<T> = std::result::Result<T, SynthesisError>;
