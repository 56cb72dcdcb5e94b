//! State-level proxy indicators

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthesisError};

/// Number of proxy indicators per state
pub const FEATURE_COUNT: usize = 8;

/// The eight named proxy indicators, in matrix column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyFeature {
    /// Prevalence proxy divided by notifications
    PnRatio,
    /// Incidence proxy (notifications + deaths) divided by notifications
    InRatio,
    SymptomaticNoCarePct,
    PrivateFirstProviderPct,
    BactConfirmedPct,
    /// Persons per household
    CrowdingIndex,
    LiteracyPct,
    PovertyPct,
}

impl ProxyFeature {
    /// All features in matrix column order
    pub const ALL: [Self; FEATURE_COUNT] = [
        Self::PnRatio,
        Self::InRatio,
        Self::SymptomaticNoCarePct,
        Self::PrivateFirstProviderPct,
        Self::BactConfirmedPct,
        Self::CrowdingIndex,
        Self::LiteracyPct,
        Self::PovertyPct,
    ];

    /// Column index of this feature
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Column / node name used in tables and the causal graph
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PnRatio => "pn_ratio",
            Self::InRatio => "in_ratio",
            Self::SymptomaticNoCarePct => "symptomatic_no_care_pct",
            Self::PrivateFirstProviderPct => "private_first_provider_pct",
            Self::BactConfirmedPct => "bact_confirmed_pct",
            Self::CrowdingIndex => "crowding_index",
            Self::LiteracyPct => "literacy_pct",
            Self::PovertyPct => "poverty_pct",
        }
    }
}

impl fmt::Display for ProxyFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProxyFeature {
    type Err = SynthesisError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| SynthesisError::Validation(format!("Unknown proxy feature '{s}'")))
    }
}

/// One state's imputed proxy indicators (raw units, not standardized)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyFeatureVector {
    pub state: String,
    /// Values in [`ProxyFeature::ALL`] order
    pub values: [f64; FEATURE_COUNT],
    /// Which values were filled by the imputation policy
    pub imputed: [bool; FEATURE_COUNT],
    /// Number of panel years aggregated into this vector
    pub years: usize,
}

impl ProxyFeatureVector {
    #[must_use]
    pub const fn get(&self, feature: ProxyFeature) -> f64 {
        self.values[feature.index()]
    }

    #[must_use]
    pub const fn was_imputed(&self, feature: ProxyFeature) -> bool {
        self.imputed[feature.index()]
    }

    /// True when every indicator had to be imputed
    #[must_use]
    pub fn is_entirely_imputed(&self) -> bool {
        self.imputed.iter().all(|&i| i)
    }
}

/// Row-major copy of the feature values, one row per state
#[must_use]
pub fn feature_rows(features: &[ProxyFeatureVector]) -> Vec<Vec<f64>> {
    features.iter().map(|f| f.values.to_vec()).collect()
}
