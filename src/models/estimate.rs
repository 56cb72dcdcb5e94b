//! Pooled delay estimates produced by the classical and Bayesian poolers

use serde::{Deserialize, Serialize};

use super::delay::DelayCategory;

/// Result of DerSimonian-Laird random-effects pooling for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PooledEstimate {
    pub category: DelayCategory,
    pub point_estimate: f64,
    pub standard_error: f64,
    pub interval_low: f64,
    pub interval_high: f64,
    pub heterogeneity_tau_squared: f64,
    pub q_statistic: f64,
    /// Share of total variability due to heterogeneity, in [0, 1]
    pub i_squared: f64,
    /// Upper-tail chi-square p-value of Q; `None` for a single study
    pub q_p_value: Option<f64>,
    pub k_studies: usize,
}

/// Shape of a posterior interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalKind {
    /// Shortest window of the sorted draws holding the requested mass
    #[default]
    HighestDensity,
    /// Quantiles at `(1 - level) / 2` and `(1 + level) / 2`
    EqualTailed,
}

impl IntervalKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::HighestDensity => "HDI",
            Self::EqualTailed => "credible interval",
        }
    }
}

/// Posterior summary of one scalar parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    pub mean: f64,
    pub sd: f64,
    pub interval_low: f64,
    pub interval_high: f64,
    /// Split potential-scale-reduction statistic
    pub r_hat: f64,
    /// Bulk effective sample size across chains
    pub ess: f64,
}

/// Sampler health indicators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceDiagnostics {
    pub chains: usize,
    pub draws_per_chain: usize,
    pub warmup: usize,
    pub divergences: usize,
    pub mean_accept_stat: f64,
    /// Adapted step size of each chain
    pub step_sizes: Vec<f64>,
    pub max_r_hat: f64,
    pub min_ess: f64,
}

/// Posterior mean and SD of one study's shrunken effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyEffect {
    pub study_id: String,
    pub observed: f64,
    pub posterior_mean: f64,
    pub posterior_sd: f64,
}

/// Full Bayesian hierarchical pooling result for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorSummary {
    pub category: DelayCategory,
    pub backend: String,
    pub credible_level: f64,
    /// How `interval_low` and `interval_high` of `mu` and `tau` were drawn
    pub interval: IntervalKind,
    /// Overall mean delay
    pub mu: ParameterSummary,
    /// Between-study standard deviation
    pub tau: ParameterSummary,
    pub study_effects: Vec<StudyEffect>,
    pub diagnostics: ConvergenceDiagnostics,
    pub k_studies: usize,
}

/// Outcome of a Bayesian request
///
/// `Unavailable` is a sentinel, not an error: downstream consumers treat
/// Bayesian results as optional enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BayesianOutcome<T = PosteriorSummary> {
    Posterior(Box<T>),
    Unavailable { reason: String },
}

impl<T> BayesianOutcome<T> {
    #[must_use]
    pub fn posterior(&self) -> Option<&T> {
        match self {
            Self::Posterior(summary) => Some(summary),
            Self::Unavailable { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Posterior(_))
    }
}

/// Posterior of one regression parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionCoefficient {
    /// `intercept`, a predictor name, or `sigma`
    pub parameter: String,
    #[serde(flatten)]
    pub summary: ParameterSummary,
}

/// Posterior prediction of one state's prevalence-to-notification ratio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePrediction {
    pub state: String,
    /// Observed ratio, clipped at zero
    pub observed: f64,
    pub posterior_mean: f64,
    /// Equal-tailed bounds of the linear predictor, back-transformed
    pub interval_low: f64,
    pub interval_high: f64,
}

/// Bayesian regression of `log1p(pn_ratio)` on the other proxy features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionSummary {
    pub backend: String,
    pub target: String,
    /// Predictor names in coefficient order
    pub predictors: Vec<String>,
    pub n_states: usize,
    /// Mass of the prediction intervals and of the coefficient HDIs
    pub interval_level: f64,
    /// Intercept, one entry per predictor, then sigma
    pub coefficients: Vec<RegressionCoefficient>,
    /// Modelled states, sorted by name
    pub predictions: Vec<StatePrediction>,
    pub diagnostics: ConvergenceDiagnostics,
    /// R-hat and ESS within the configured limits
    pub converged: bool,
}

impl RegressionSummary {
    #[must_use]
    pub fn coefficient(&self, parameter: &str) -> Option<&ParameterSummary> {
        self.coefficients
            .iter()
            .find(|c| c.parameter == parameter)
            .map(|c| &c.summary)
    }

    #[must_use]
    pub fn prediction_for(&self, state: &str) -> Option<&StatePrediction> {
        self.predictions.iter().find(|p| p.state == state)
    }
}

/// Where the headline estimate for a category came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateSource {
    Bayesian,
    Classical,
    /// Bayesian sampling failed its diagnostics; classical result used and
    /// flagged as lower confidence
    ClassicalFallback { reason: String },
}

/// Headline estimate for one category after reconciling both poolers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEstimate {
    pub category: DelayCategory,
    pub classical: PooledEstimate,
    pub bayesian: Option<PosteriorSummary>,
    pub source: EstimateSource,
}

impl CategoryEstimate {
    /// Headline point estimate (posterior mean when Bayesian is the source)
    #[must_use]
    pub fn value(&self) -> f64 {
        match (&self.source, &self.bayesian) {
            (EstimateSource::Bayesian, Some(posterior)) => posterior.mu.mean,
            _ => self.classical.point_estimate,
        }
    }

    /// Headline interval
    #[must_use]
    pub fn interval(&self) -> (f64, f64) {
        match (&self.source, &self.bayesian) {
            (EstimateSource::Bayesian, Some(posterior)) => {
                (posterior.mu.interval_low, posterior.mu.interval_high)
            }
            _ => (self.classical.interval_low, self.classical.interval_high),
        }
    }

    #[must_use]
    pub const fn is_lower_confidence(&self) -> bool {
        matches!(self.source, EstimateSource::ClassicalFallback { .. })
    }
}
