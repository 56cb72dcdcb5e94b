//! Study-level delay observations
//!
//! This module contains the delay observation model and the in-memory store
//! that the poolers read from. Raw extracted rows carry whatever precision
//! information the study reported; the store turns them into observations
//! with a strictly positive variance using an explicit imputation policy.

use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::VarianceImputation;
use crate::error::{Result, SynthesisError};

/// Segment of the care pathway a delay refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayCategory {
    /// Symptom onset to first contact with a provider
    Patient,
    /// First contact to diagnosis
    Diagnostic,
    /// Diagnosis to treatment initiation
    Treatment,
    /// Symptom onset to treatment initiation
    Total,
}

impl DelayCategory {
    /// All categories in reporting order
    pub const ALL: [Self; 4] = [Self::Patient, Self::Diagnostic, Self::Treatment, Self::Total];

    /// Short machine name (`patient`, `diagnostic`, ...)
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Diagnostic => "diagnostic",
            Self::Treatment => "treatment",
            Self::Total => "total",
        }
    }

    /// Human-readable label used in report tables
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Patient => "Patient delay (days)",
            Self::Diagnostic => "Diagnostic delay (days)",
            Self::Treatment => "Treatment delay (days)",
            Self::Total => "Total delay (days)",
        }
    }

    /// Column prefix in the wide literature-extraction layout
    /// (`patient_delay_days`, `patient_delay_se`, `patient_delay_sd`)
    #[must_use]
    pub fn column_prefix(self) -> String {
        format!("{}_delay", self.as_str())
    }
}

impl fmt::Display for DelayCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DelayCategory {
    type Err = SynthesisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "patient" => Ok(Self::Patient),
            "diagnostic" => Ok(Self::Diagnostic),
            "treatment" => Ok(Self::Treatment),
            "total" => Ok(Self::Total),
            other => Err(SynthesisError::Validation(format!(
                "Unknown delay category '{other}' (expected patient, diagnostic, treatment or total)"
            ))),
        }
    }
}

/// One extracted delay measurement before variance imputation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDelayRecord {
    pub category: DelayCategory,
    /// Reported delay in days
    pub effect: f64,
    /// Reported standard error of the delay, if any
    pub standard_error: Option<f64>,
    /// Reported standard deviation of the delay, if any
    pub standard_deviation: Option<f64>,
    pub sample_size: Option<f64>,
    pub study_id: String,
    pub state: Option<String>,
    pub year: Option<i32>,
}

impl RawDelayRecord {
    /// Create a record with only the mandatory fields set
    #[must_use]
    pub fn new(category: DelayCategory, effect: f64, study_id: impl Into<String>) -> Self {
        Self {
            category,
            effect,
            standard_error: None,
            standard_deviation: None,
            sample_size: None,
            study_id: study_id.into(),
            state: None,
            year: None,
        }
    }

    /// Set the reported standard error
    #[must_use]
    pub const fn with_standard_error(mut self, se: f64) -> Self {
        self.standard_error = Some(se);
        self
    }

    /// Set the reported standard deviation and sample size
    #[must_use]
    pub const fn with_sd_and_n(mut self, sd: f64, n: f64) -> Self {
        self.standard_deviation = Some(sd);
        self.sample_size = Some(n);
        self
    }

    /// Set the state and study year
    #[must_use]
    pub fn with_location(mut self, state: Option<String>, year: Option<i32>) -> Self {
        self.state = state;
        self.year = year;
        self
    }
}

/// Which rule produced an observation's variance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceSource {
    /// Square of the reported standard error
    ReportedStandardError,
    /// (SD / sqrt(n))^2
    DerivedFromSd,
    /// (cv * effect)^2 with the policy's default coefficient of variation
    CoefficientOfVariation,
    /// Policy fallback variance when nothing else yields a positive value
    Fallback,
}

/// One study-level delay measurement ready for pooling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayObservation {
    pub category: DelayCategory,
    /// Delay in days, non-negative
    pub effect: f64,
    /// Sampling variance, strictly positive
    pub variance: f64,
    pub variance_source: VarianceSource,
    pub sample_size: Option<f64>,
    pub study_id: String,
    pub state: Option<String>,
    pub year: Option<i32>,
}

impl DelayObservation {
    /// Build an observation with a known variance
    ///
    /// Fails unless `effect` is finite and non-negative and `variance` is
    /// finite and strictly positive.
    pub fn new(
        category: DelayCategory,
        effect: f64,
        variance: f64,
        study_id: impl Into<String>,
    ) -> Result<Self> {
        let study_id = study_id.into();
        if !effect.is_finite() || effect < 0.0 {
            return Err(SynthesisError::Validation(format!(
                "Study {study_id}: delay effect must be a finite non-negative number of days, got {effect}"
            )));
        }
        if !variance.is_finite() || variance <= 0.0 {
            return Err(SynthesisError::Validation(format!(
                "Study {study_id}: variance must be finite and positive, got {variance}"
            )));
        }
        Ok(Self {
            category,
            effect,
            variance,
            variance_source: VarianceSource::ReportedStandardError,
            sample_size: None,
            study_id,
            state: None,
            year: None,
        })
    }

    /// Standard error implied by the variance
    #[must_use]
    pub fn standard_error(&self) -> f64 {
        self.variance.sqrt()
    }

    /// Impute the variance of a raw record according to `policy`
    ///
    /// Returns `None` when the effect itself is unusable (missing, negative,
    /// or non-finite); the variance is always imputed, never dropped.
    #[must_use]
    pub fn from_raw(raw: &RawDelayRecord, policy: &VarianceImputation) -> Option<Self> {
        if !raw.effect.is_finite() || raw.effect < 0.0 {
            return None;
        }

        let positive = |v: f64| v.is_finite() && v > 0.0;

        let from_se = raw
            .standard_error
            .map(|se| se * se)
            .filter(|&v| positive(v))
            .map(|v| (v, VarianceSource::ReportedStandardError));

        let from_sd = || {
            let sd = raw.standard_deviation?;
            let n = raw.sample_size.filter(|&n| n > 0.0)?;
            let se = sd / n.sqrt();
            Some(se * se)
                .filter(|&v| positive(v))
                .map(|v| (v, VarianceSource::DerivedFromSd))
        };

        let from_cv = || {
            let se = policy.default_cv * raw.effect;
            Some(se * se)
                .filter(|&v| positive(v))
                .map(|v| (v, VarianceSource::CoefficientOfVariation))
        };

        let (variance, variance_source) = from_se
            .or_else(from_sd)
            .or_else(from_cv)
            .unwrap_or((policy.fallback_variance, VarianceSource::Fallback));

        Some(Self {
            category: raw.category,
            effect: raw.effect,
            variance,
            variance_source,
            sample_size: raw.sample_size,
            study_id: raw.study_id.clone(),
            state: raw.state.clone(),
            year: raw.year,
        })
    }
}

/// Normalized in-memory table of delay observations
#[derive(Debug, Clone, Default)]
pub struct DelayRecordStore {
    observations: Vec<DelayObservation>,
    rejected: usize,
}

impl DelayRecordStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from raw extracted records, imputing variances
    ///
    /// Records whose effect is unusable are counted as rejected and logged.
    pub fn from_raw(records: &[RawDelayRecord], policy: &VarianceImputation) -> Result<Self> {
        policy.validate()?;
        let mut store = Self::new();
        for raw in records {
            match DelayObservation::from_raw(raw, policy) {
                Some(obs) => {
                    if obs.variance_source != VarianceSource::ReportedStandardError {
                        debug!(
                            "Study {} ({}): variance imputed via {:?}",
                            obs.study_id, obs.category, obs.variance_source
                        );
                    }
                    store.observations.push(obs);
                }
                None => {
                    warn!(
                        "Study {} ({}): unusable delay effect {}; record skipped",
                        raw.study_id, raw.category, raw.effect
                    );
                    store.rejected += 1;
                }
            }
        }
        Ok(store)
    }

    /// Add an already-validated observation
    pub fn push(&mut self, observation: DelayObservation) {
        self.observations.push(observation);
    }

    /// All observations in insertion order
    #[must_use]
    pub fn observations(&self) -> &[DelayObservation] {
        &self.observations
    }

    /// Observations for one category, cloned in insertion order
    #[must_use]
    pub fn by_category(&self, category: DelayCategory) -> Vec<DelayObservation> {
        self.observations
            .iter()
            .filter(|o| o.category == category)
            .cloned()
            .collect()
    }

    /// Categories that have at least one observation, in reporting order
    #[must_use]
    pub fn categories(&self) -> Vec<DelayCategory> {
        DelayCategory::ALL
            .into_iter()
            .filter(|c| self.observations.iter().any(|o| o.category == *c))
            .collect()
    }

    /// Number of raw records rejected for an unusable effect
    #[must_use]
    pub const fn rejected(&self) -> usize {
        self.rejected
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}
