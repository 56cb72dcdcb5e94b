//! Configuration for the synthesis pipeline.
//!
//! Defaults reproduce the reference analysis: k = 4 typologies from 10
//! seeded restarts, four NUTS chains of 2000 draws after 1000 warm-up
//! iterations, and composite weights 0.4/0.3/0.3.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthesisError};
use crate::models::estimate::IntervalKind;

/// Policy for giving every delay observation a strictly positive variance
///
/// Rules are tried in order: reported SE, SD/sqrt(n), `default_cv` times the
/// effect, and finally `fallback_variance`. The coefficient of variation is a
/// modelling assumption; changing it changes every pooled estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceImputation {
    /// Coefficient of variation used when neither SE nor SD is reported
    pub default_cv: f64,
    /// Variance used when no rule yields a positive value (e.g. zero effect)
    pub fallback_variance: f64,
}

impl Default for VarianceImputation {
    fn default() -> Self {
        Self {
            default_cv: 0.3,
            fallback_variance: 1.0,
        }
    }
}

impl VarianceImputation {
    /// Reject policies that could produce non-positive variances
    pub fn validate(&self) -> Result<()> {
        if !self.default_cv.is_finite() || self.default_cv < 0.0 {
            return Err(SynthesisError::Validation(format!(
                "default_cv must be finite and non-negative, got {}",
                self.default_cv
            )));
        }
        if !self.fallback_variance.is_finite() || self.fallback_variance <= 0.0 {
            return Err(SynthesisError::Validation(format!(
                "fallback_variance must be finite and positive, got {}",
                self.fallback_variance
            )));
        }
        Ok(())
    }
}

/// Configuration for classical random-effects pooling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolingConfig {
    /// Normal quantile used for the confidence interval
    pub z_multiplier: f64,
    /// How missing or zero variances are imputed
    pub variance_imputation: VarianceImputation,
}

impl Default for PoolingConfig {
    fn default() -> Self {
        Self {
            z_multiplier: 1.96,
            variance_imputation: VarianceImputation::default(),
        }
    }
}

/// Configuration for the Bayesian hierarchical pooler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesianConfig {
    /// Whether to attempt Bayesian pooling at all
    pub enabled: bool,
    /// Number of independent chains (at least 2)
    pub chains: usize,
    /// Retained draws per chain
    pub draws: usize,
    /// Warm-up iterations per chain, discarded
    pub warmup: usize,
    /// Target mean acceptance statistic for step-size adaptation
    pub target_accept: f64,
    /// Maximum tree depth of the No-U-Turn sampler
    pub max_tree_depth: usize,
    /// Base random seed; chain `i` uses a seed derived from this and `i`
    pub seed: u64,
    /// Mass of the credible interval
    pub credible_level: f64,
    /// Highest-density (default) or equal-tailed interval
    #[serde(default)]
    pub interval: IntervalKind,
    /// Largest acceptable split R-hat
    pub max_r_hat: f64,
    /// Smallest acceptable bulk effective sample size
    pub min_ess: f64,
    /// Standard deviation of the Normal(0, sd) prior on the overall mean
    pub mu_prior_sd: f64,
    /// Scale of the HalfNormal prior on the between-study SD
    pub tau_prior_scale: f64,
    /// Show per-chain progress bars while sampling
    pub show_progress: bool,
}

impl Default for BayesianConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chains: 4,
            draws: 2000,
            warmup: 1000,
            target_accept: 0.9,
            max_tree_depth: 10,
            seed: 42,
            credible_level: 0.95,
            interval: IntervalKind::HighestDensity,
            max_r_hat: 1.1,
            min_ess: 400.0,
            mu_prior_sd: 10.0,
            tau_prior_scale: 1.0,
            show_progress: false,
        }
    }
}

impl BayesianConfig {
    /// Set the sampling budget
    #[must_use]
    pub const fn with_budget(mut self, chains: usize, draws: usize, warmup: usize) -> Self {
        self.chains = chains;
        self.draws = draws;
        self.warmup = warmup;
        self
    }

    /// Set the base random seed
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the convergence thresholds
    #[must_use]
    pub const fn with_convergence_limits(mut self, max_r_hat: f64, min_ess: f64) -> Self {
        self.max_r_hat = max_r_hat;
        self.min_ess = min_ess;
        self
    }

    #[must_use]
    pub const fn with_interval(mut self, interval: IntervalKind) -> Self {
        self.interval = interval;
        self
    }

    /// Reject settings the sampler cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.chains < 2 {
            return Err(SynthesisError::Validation(format!(
                "at least 2 chains are required for convergence diagnostics, got {}",
                self.chains
            )));
        }
        if self.draws < 4 {
            return Err(SynthesisError::Validation(format!(
                "at least 4 draws per chain are required, got {}",
                self.draws
            )));
        }
        if !(0.0..1.0).contains(&self.target_accept) || self.target_accept == 0.0 {
            return Err(SynthesisError::Validation(format!(
                "target_accept must lie in (0, 1), got {}",
                self.target_accept
            )));
        }
        if !(0.0..1.0).contains(&self.credible_level) || self.credible_level == 0.0 {
            return Err(SynthesisError::Validation(format!(
                "credible_level must lie in (0, 1), got {}",
                self.credible_level
            )));
        }
        if self.mu_prior_sd <= 0.0 || self.tau_prior_scale <= 0.0 {
            return Err(SynthesisError::Validation(
                "prior scales must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the Bayesian regression of the prevalence ratio on
/// the other proxy features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    pub enabled: bool,
    /// Fewest states with fully observed proxies the model is fitted on
    pub min_states: usize,
    pub chains: usize,
    pub draws: usize,
    pub warmup: usize,
    pub target_accept: f64,
    pub max_tree_depth: usize,
    pub seed: u64,
    /// Mass of the prediction intervals and coefficient HDIs
    pub interval_level: f64,
    pub intercept_prior_sd: f64,
    pub coef_prior_sd: f64,
    /// Scale of the HalfNormal prior on the residual SD
    pub sigma_prior_scale: f64,
    /// Largest acceptable split R-hat before the fit is flagged
    pub max_r_hat: f64,
    /// Smallest acceptable bulk ESS before the fit is flagged
    pub min_ess: f64,
    pub show_progress: bool,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_states: 6,
            chains: 2,
            draws: 1000,
            warmup: 1000,
            target_accept: 0.9,
            max_tree_depth: 10,
            seed: 42,
            interval_level: 0.9,
            intercept_prior_sd: 2.0,
            coef_prior_sd: 1.0,
            sigma_prior_scale: 1.0,
            max_r_hat: 1.1,
            min_ess: 100.0,
            show_progress: false,
        }
    }
}

impl RegressionConfig {
    /// Set the sampling budget
    #[must_use]
    pub const fn with_budget(mut self, chains: usize, draws: usize, warmup: usize) -> Self {
        self.chains = chains;
        self.draws = draws;
        self.warmup = warmup;
        self
    }

    #[must_use]
    pub const fn with_min_states(mut self, min_states: usize) -> Self {
        self.min_states = min_states;
        self
    }

    /// Reject settings the sampler cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.chains < 2 {
            return Err(SynthesisError::Validation(format!(
                "the state regression needs at least 2 chains, got {}",
                self.chains
            )));
        }
        if self.draws < 4 {
            return Err(SynthesisError::Validation(format!(
                "at least 4 draws per chain are required, got {}",
                self.draws
            )));
        }
        for (name, value) in [
            ("target_accept", self.target_accept),
            ("interval_level", self.interval_level),
        ] {
            if !(0.0..1.0).contains(&value) || value == 0.0 {
                return Err(SynthesisError::Validation(format!(
                    "{name} must lie in (0, 1), got {value}"
                )));
            }
        }
        if self.intercept_prior_sd <= 0.0 || self.coef_prior_sd <= 0.0 || self.sigma_prior_scale <= 0.0
        {
            return Err(SynthesisError::Validation(
                "regression prior scales must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for proxy feature construction
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// National prevalence-survey case count apportioned to states by
    /// population share; without it the prevalence ratio is missing
    pub prevalence_cases: Option<f64>,
}

/// Configuration for k-means typologies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Requested number of clusters (clamped to the number of states)
    pub k: usize,
    /// Number of seeded restarts
    pub restarts: usize,
    /// Maximum Lloyd iterations per restart
    pub max_iterations: usize,
    /// Convergence tolerance on total centroid shift
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            k: 4,
            restarts: 10,
            max_iterations: 300,
            tolerance: 1e-4,
            seed: 42,
        }
    }
}

impl ClusterConfig {
    #[must_use]
    pub const fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Configuration for principal component analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaConfig {
    /// Number of top-loading features named per component
    pub top_loadings: usize,
    /// Number of components given a textual interpretation
    pub interpreted_components: usize,
}

impl Default for PcaConfig {
    fn default() -> Self {
        Self {
            top_loadings: 3,
            interpreted_components: 3,
        }
    }
}

/// Configuration for the causal graph layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalConfig {
    /// Hard cap on nodes; path enumeration grows combinatorially
    pub max_nodes: usize,
    /// Node whose influence is reported as the delay-ratio influence
    pub ratio_node: String,
    /// Node whose influence is reported as the deprivation influence
    pub poverty_node: String,
}

impl Default for CausalConfig {
    fn default() -> Self {
        Self {
            max_nodes: 64,
            ratio_node: "pn_ratio".to_string(),
            poverty_node: "poverty_pct".to_string(),
        }
    }
}

/// Fixed weights of the composite risk score
///
/// Any change to the weights must bump `version`, since it changes
/// policy-relevant rankings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub version: String,
    /// Weight of the prevalence-to-notification ratio
    pub ratio: f64,
    /// Weight of the poverty proxy
    pub poverty: f64,
    /// Weight of the symptomatic-non-care proxy
    pub symptomatic: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
            ratio: 0.4,
            poverty: 0.3,
            symptomatic: 0.3,
        }
    }
}

/// Top-level configuration passed to every stage through the run context
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub pooling: PoolingConfig,
    pub bayesian: BayesianConfig,
    pub regression: RegressionConfig,
    pub proxy: ProxyConfig,
    pub cluster: ClusterConfig,
    pub pca: PcaConfig,
    pub causal: CausalConfig,
    pub weights: ScoreWeights,
}

impl SynthesisConfig {
    /// Create a configuration with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; omitted sections keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            SynthesisError::io(format!("Failed to open config {}", path.display()), e)
        })?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section that has constraints
    pub fn validate(&self) -> Result<()> {
        self.pooling.variance_imputation.validate()?;
        self.bayesian.validate()?;
        self.regression.validate()?;
        let weights = [self.weights.ratio, self.weights.poverty, self.weights.symptomatic];
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(SynthesisError::Validation(
                "Composite score weights must be finite".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_bayesian(mut self, bayesian: BayesianConfig) -> Self {
        self.bayesian = bayesian;
        self
    }

    #[must_use]
    pub fn with_regression(mut self, regression: RegressionConfig) -> Self {
        self.regression = regression;
        self
    }

    #[must_use]
    pub fn with_cluster(mut self, cluster: ClusterConfig) -> Self {
        self.cluster = cluster;
        self
    }

    #[must_use]
    pub const fn with_prevalence_cases(mut self, cases: Option<f64>) -> Self {
        self.proxy.prevalence_cases = cases;
        self
    }

    #[must_use]
    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }
}

impl fmt::Display for SynthesisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Synthesis Configuration:")?;
        writeln!(
            f,
            "  Pooling: z = {}, default CV = {}, fallback variance = {}",
            self.pooling.z_multiplier,
            self.pooling.variance_imputation.default_cv,
            self.pooling.variance_imputation.fallback_variance
        )?;
        if self.bayesian.enabled {
            writeln!(
                f,
                "  Bayesian: {} chains x {} draws ({} warm-up), target accept {}, seed {}",
                self.bayesian.chains,
                self.bayesian.draws,
                self.bayesian.warmup,
                self.bayesian.target_accept,
                self.bayesian.seed
            )?;
        } else {
            writeln!(f, "  Bayesian: disabled")?;
        }
        if self.regression.enabled {
            writeln!(
                f,
                "  State regression: {} chains x {} draws, at least {} states",
                self.regression.chains, self.regression.draws, self.regression.min_states
            )?;
        } else {
            writeln!(f, "  State regression: disabled")?;
        }
        match self.proxy.prevalence_cases {
            Some(cases) => writeln!(f, "  Prevalence survey cases: {cases}")?,
            None => writeln!(f, "  Prevalence survey cases: not provided")?,
        }
        writeln!(
            f,
            "  Clustering: k = {}, {} restarts, seed {}",
            self.cluster.k, self.cluster.restarts, self.cluster.seed
        )?;
        writeln!(
            f,
            "  Composite weights ({}): ratio {}, poverty {}, symptomatic {}",
            self.weights.version,
            self.weights.ratio,
            self.weights.poverty,
            self.weights.symptomatic
        )?;
        Ok(())
    }
}
