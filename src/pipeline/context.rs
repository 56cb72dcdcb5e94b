//! Explicit run context threaded through every pipeline stage

use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::SynthesisConfig;

/// A non-fatal problem recorded while running the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineWarning {
    pub stage: String,
    pub message: String,
}

/// Configuration plus the append-only warning list of one run
#[derive(Debug, Clone)]
pub struct RunContext {
    config: SynthesisConfig,
    warnings: Vec<PipelineWarning>,
}

impl RunContext {
    #[must_use]
    pub const fn new(config: SynthesisConfig) -> Self {
        Self {
            config,
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Log and record a warning
    pub fn warn(&mut self, stage: &str, message: impl Into<String>) {
        let message = message.into();
        warn!("[{stage}] {message}");
        self.warnings.push(PipelineWarning {
            stage: stage.to_string(),
            message,
        });
    }

    #[must_use]
    pub fn warnings(&self) -> &[PipelineWarning] {
        &self.warnings
    }

    #[must_use]
    pub fn into_warnings(self) -> Vec<PipelineWarning> {
        self.warnings
    }
}
