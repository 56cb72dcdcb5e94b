//! Bayesian hierarchical pooling
//!
//! The pooler talks to a [`BayesianBackend`]. The built-in backend is the
//! NUTS sampler in [`nuts`], compiled in with the `nuts` feature. When no
//! backend is available the pooler returns
//! [`BayesianOutcome::Unavailable`] instead of failing, so callers can keep
//! the classical estimate. The state regression in [`regression`] samples
//! through the same backend.

pub mod diagnostics;
pub mod model;
#[cfg(feature = "nuts")]
pub mod nuts;
pub mod regression;

use std::sync::Arc;

use log::{info, warn};

use crate::config::BayesianConfig;
use crate::error::{Result, SynthesisError};
use crate::models::delay::{DelayCategory, DelayObservation};
use crate::models::estimate::{
    BayesianOutcome, ConvergenceDiagnostics, ParameterSummary, PosteriorSummary, StudyEffect,
};

use self::diagnostics::{describe, effective_sample_size, split_r_hat};
use self::model::HierarchicalModel;
use self::regression::RegressionModel;
use crate::models::estimate::IntervalKind;

/// Draws of one chain on the constrained scale
#[derive(Debug, Clone, PartialEq)]
pub struct ChainTrace {
    pub mu: Vec<f64>,
    pub tau: Vec<f64>,
    pub divergences: usize,
    pub mean_accept_stat: f64,
    pub step_size: f64,
}

/// Draws of one chain over a whole parameter vector, constrained scale
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterTrace {
    /// One parameter vector per retained draw
    pub draws: Vec<Vec<f64>>,
    pub divergences: usize,
    pub mean_accept_stat: f64,
    pub step_size: f64,
}

/// Sampling budget handed to a backend
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingRequest {
    pub chains: usize,
    pub draws: usize,
    pub warmup: usize,
    pub target_accept: f64,
    pub max_tree_depth: usize,
    pub seed: u64,
    pub show_progress: bool,
}

/// A probabilistic backend able to sample the hierarchical model
pub trait BayesianBackend: Send + Sync {
    /// Name recorded in the posterior summary
    fn name(&self) -> &str;

    /// `Err(reason)` when the backend cannot be used in this process
    fn availability(&self) -> std::result::Result<(), String> {
        Ok(())
    }

    /// Run independent chains and return their post-warm-up draws
    fn sample(
        &self,
        category: DelayCategory,
        model: &HierarchicalModel,
        request: &SamplingRequest,
    ) -> Result<Vec<ChainTrace>>;

    /// Run independent chains of the state regression
    ///
    /// Draws are `(intercept, coefficients.., sigma)`. Backends that only
    /// handle the hierarchical model keep this default, which reports
    /// `BackendUnavailable`.
    fn sample_regression(
        &self,
        _model: &RegressionModel,
        _request: &SamplingRequest,
    ) -> Result<Vec<ParameterTrace>> {
        Err(SynthesisError::BackendUnavailable(format!(
            "backend '{}' cannot sample the state regression",
            self.name()
        )))
    }
}

/// Chain-specific seed; chains never share a random stream
#[must_use]
pub const fn chain_seed(base: u64, chain: usize) -> u64 {
    base.wrapping_add((chain as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Built-in No-U-Turn backend, one `rayon` task per chain
#[cfg(feature = "nuts")]
#[derive(Debug, Clone, Copy, Default)]
pub struct NutsBackend;

#[cfg(feature = "nuts")]
impl NutsBackend {
    /// One seeded chain per `rayon` task
    fn run_chains<M, F>(
        model: &M,
        label: &str,
        request: &SamplingRequest,
        initial: F,
    ) -> Vec<nuts::ChainOutput>
    where
        M: model::LogDensity,
        F: Fn(&mut rand::rngs::StdRng) -> Vec<f64> + Sync,
    {
        use rand::SeedableRng;
        use rand::rngs::StdRng;
        use rayon::prelude::*;

        use self::nuts::{NutsChain, NutsSettings};
        use crate::utils::logging::progress::chain_progress_bars;

        let settings = NutsSettings {
            warmup: request.warmup,
            draws: request.draws,
            target_accept: request.target_accept,
            max_tree_depth: request.max_tree_depth,
        };
        let (_mp, bars) = chain_progress_bars(
            request.chains,
            request.warmup + request.draws,
            label,
            request.show_progress,
        );

        (0..request.chains)
            .into_par_iter()
            .map(|chain| {
                let mut rng = StdRng::seed_from_u64(chain_seed(request.seed, chain));
                let start = initial(&mut rng);
                let output = NutsChain::new(model, settings.clone()).run(start, &mut rng, &bars[chain]);
                bars[chain].finish_and_clear();
                log::debug!(
                    "{label} chain {chain}: step size {:.4}, mean accept {:.3}, {} divergences",
                    output.step_size, output.mean_accept_stat, output.divergences
                );
                output
            })
            .collect()
    }
}

#[cfg(feature = "nuts")]
impl BayesianBackend for NutsBackend {
    fn name(&self) -> &str {
        "nuts"
    }

    fn sample(
        &self,
        category: DelayCategory,
        model: &HierarchicalModel,
        request: &SamplingRequest,
    ) -> Result<Vec<ChainTrace>> {
        use rand::Rng;

        use self::model::{LOG_TAU, MU};

        let effects = model.effects();
        let centre = effects.iter().sum::<f64>() / effects.len() as f64;
        let spread = (effects.iter().map(|y| (y - centre).powi(2)).sum::<f64>()
            / effects.len() as f64)
            .sqrt()
            .max(1.0);

        let outputs = Self::run_chains(model, category.as_str(), request, |rng| {
            let mut initial = vec![0.0; 2];
            initial[MU] = centre + spread * rng.random_range(-1.0..1.0);
            initial[LOG_TAU] = rng.random_range(-1.0..1.0);
            initial
        });

        Ok(outputs
            .into_iter()
            .map(|output| ChainTrace {
                mu: output.draws.iter().map(|d| d[MU]).collect(),
                tau: output.draws.iter().map(|d| d[LOG_TAU].exp()).collect(),
                divergences: output.divergences,
                mean_accept_stat: output.mean_accept_stat,
                step_size: output.step_size,
            })
            .collect())
    }

    fn sample_regression(
        &self,
        model: &RegressionModel,
        request: &SamplingRequest,
    ) -> Result<Vec<ParameterTrace>> {
        use rand::Rng;

        use self::model::LogDensity;

        let dim = model.dim();
        let log_sigma = model.log_sigma_index();
        let outputs = Self::run_chains(model, "regression", request, |rng| {
            (0..dim).map(|_| rng.random_range(-1.0..1.0)).collect()
        });

        Ok(outputs
            .into_iter()
            .map(|output| ParameterTrace {
                draws: output
                    .draws
                    .into_iter()
                    .map(|mut d| {
                        d[log_sigma] = d[log_sigma].exp();
                        d
                    })
                    .collect(),
                divergences: output.divergences,
                mean_accept_stat: output.mean_accept_stat,
                step_size: output.step_size,
            })
            .collect())
    }
}

/// The backend compiled into this build, if any
#[must_use]
pub fn default_backend() -> Option<Arc<dyn BayesianBackend>> {
    #[cfg(feature = "nuts")]
    {
        Some(Arc::new(NutsBackend))
    }
    #[cfg(not(feature = "nuts"))]
    {
        None
    }
}

/// Hierarchical random-effects pooler over a pluggable backend
#[derive(Clone)]
pub struct BayesianHierarchicalPooler {
    config: BayesianConfig,
    backend: Option<Arc<dyn BayesianBackend>>,
}

impl std::fmt::Debug for BayesianHierarchicalPooler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BayesianHierarchicalPooler")
            .field("config", &self.config)
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .finish()
    }
}

impl BayesianHierarchicalPooler {
    /// Pooler using the backend compiled into this build
    #[must_use]
    pub fn new(config: BayesianConfig) -> Self {
        Self {
            config,
            backend: default_backend(),
        }
    }

    /// Pooler using an explicit backend
    #[must_use]
    pub fn with_backend(config: BayesianConfig, backend: Arc<dyn BayesianBackend>) -> Self {
        Self {
            config,
            backend: Some(backend),
        }
    }

    /// Pooler with no backend; every request reports `Unavailable`
    #[must_use]
    pub const fn without_backend(config: BayesianConfig) -> Self {
        Self {
            config,
            backend: None,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &BayesianConfig {
        &self.config
    }

    /// Pool with the configured sampling budget
    pub fn pool(&self, observations: &[DelayObservation]) -> Result<BayesianOutcome> {
        self.pool_bayesian(
            observations,
            self.config.chains,
            self.config.draws,
            self.config.warmup,
        )
    }

    /// Sample the hierarchical model for one category
    ///
    /// # Errors
    /// * `InsufficientData` for fewer than two usable studies
    /// * `Validation` for an invalid budget or mixed categories
    /// * `Convergence` when R-hat or ESS miss their thresholds
    pub fn pool_bayesian(
        &self,
        observations: &[DelayObservation],
        chains: usize,
        draws: usize,
        warmup: usize,
    ) -> Result<BayesianOutcome> {
        let Some(backend) = &self.backend else {
            return Ok(BayesianOutcome::Unavailable {
                reason: "no Bayesian backend compiled into this build".to_string(),
            });
        };
        if let Err(reason) = backend.availability() {
            warn!("Bayesian backend '{}' unavailable: {reason}", backend.name());
            return Ok(BayesianOutcome::Unavailable { reason });
        }

        let config = self.config.clone().with_budget(chains, draws, warmup);
        config.validate()?;

        let usable: Vec<&DelayObservation> = observations
            .iter()
            .filter(|o| o.variance.is_finite() && o.variance > 0.0 && o.effect.is_finite())
            .collect();
        let Some(first) = usable.first() else {
            return Err(SynthesisError::insufficient(
                "Bayesian pooling",
                "no observation with a positive variance",
            ));
        };
        let category = first.category;
        if usable.len() < 2 {
            return Err(SynthesisError::insufficient(
                "Bayesian pooling",
                format!("{category} has {} usable study, at least 2 are required", usable.len()),
            ));
        }
        if usable.iter().any(|o| o.category != category) {
            return Err(SynthesisError::Validation(
                "observations passed to one pooling call span several delay categories"
                    .to_string(),
            ));
        }

        let model = HierarchicalModel::new(
            usable.iter().map(|o| o.effect).collect(),
            usable.iter().map(|o| o.variance).collect(),
            config.mu_prior_sd,
            config.tau_prior_scale,
        );
        let request = SamplingRequest {
            chains: config.chains,
            draws: config.draws,
            warmup: config.warmup,
            target_accept: config.target_accept,
            max_tree_depth: config.max_tree_depth,
            seed: config.seed,
            show_progress: config.show_progress,
        };

        info!(
            "{category}: sampling {} chains x {} draws ({} warm-up) with '{}'",
            request.chains,
            request.draws,
            request.warmup,
            backend.name()
        );
        let traces = match backend.sample(category, &model, &request) {
            Ok(traces) => traces,
            Err(SynthesisError::BackendUnavailable(reason)) => {
                warn!("{category}: backend '{}' unavailable: {reason}", backend.name());
                return Ok(BayesianOutcome::Unavailable { reason });
            }
            Err(e) => return Err(e),
        };
        if traces.len() < 2 || traces.iter().any(|t| t.mu.len() < 4 || t.mu.len() != t.tau.len()) {
            return Err(SynthesisError::Validation(format!(
                "backend '{}' returned malformed traces",
                backend.name()
            )));
        }

        let summary = summarize(category, backend.name(), &config, &model, &usable, &traces);
        let diagnostics = &summary.diagnostics;
        let converged = diagnostics.max_r_hat.is_finite()
            && diagnostics.max_r_hat <= config.max_r_hat
            && diagnostics.min_ess.is_finite()
            && diagnostics.min_ess >= config.min_ess;
        if !converged {
            return Err(SynthesisError::Convergence {
                category,
                max_r_hat: diagnostics.max_r_hat,
                r_hat_limit: config.max_r_hat,
                min_ess: diagnostics.min_ess,
                ess_required: config.min_ess,
            });
        }
        if diagnostics.divergences > 0 {
            warn!(
                "{category}: {} divergent transitions after warm-up",
                diagnostics.divergences
            );
        }

        info!(
            "{category}: posterior mu {:.2} [{:.2}, {:.2}], tau {:.2} (R-hat {:.3}, ESS {:.0})",
            summary.mu.mean,
            summary.mu.interval_low,
            summary.mu.interval_high,
            summary.tau.mean,
            diagnostics.max_r_hat,
            diagnostics.min_ess
        );
        Ok(BayesianOutcome::Posterior(Box::new(summary)))
    }
}

pub(crate) fn parameter_summary(
    chains: &[Vec<f64>],
    credible_level: f64,
    kind: IntervalKind,
) -> ParameterSummary {
    let pooled: Vec<f64> = chains.iter().flatten().copied().collect();
    let (mean, sd, interval_low, interval_high) = describe(&pooled, credible_level, kind);
    ParameterSummary {
        mean,
        sd,
        interval_low,
        interval_high,
        r_hat: split_r_hat(chains),
        ess: effective_sample_size(chains),
    }
}

fn summarize(
    category: DelayCategory,
    backend: &str,
    config: &BayesianConfig,
    model: &HierarchicalModel,
    observations: &[&DelayObservation],
    traces: &[ChainTrace],
) -> PosteriorSummary {
    let mu_chains: Vec<Vec<f64>> = traces.iter().map(|t| t.mu.clone()).collect();
    let tau_chains: Vec<Vec<f64>> = traces.iter().map(|t| t.tau.clone()).collect();
    let mu = parameter_summary(&mu_chains, config.credible_level, config.interval);
    let tau = parameter_summary(&tau_chains, config.credible_level, config.interval);

    // Law of total variance over the conditional Normal of each study effect
    let study_effects = observations
        .iter()
        .enumerate()
        .map(|(i, obs)| {
            let mut n = 0.0;
            let mut mean = 0.0;
            let mut m2 = 0.0;
            let mut conditional_var = 0.0;
            for (m, t) in mu_chains.iter().flatten().zip(tau_chains.iter().flatten()) {
                let (cond_mean, cond_var) = model.study_conditional(i, *m, *t);
                n += 1.0;
                let delta = cond_mean - mean;
                mean += delta / n;
                m2 += delta * (cond_mean - mean);
                conditional_var += cond_var;
            }
            StudyEffect {
                study_id: obs.study_id.clone(),
                observed: obs.effect,
                posterior_mean: mean,
                posterior_sd: (conditional_var / n + m2 / n).sqrt(),
            }
        })
        .collect();

    let max_r_hat = mu.r_hat.max(tau.r_hat);
    let min_ess = mu.ess.min(tau.ess);
    let diagnostics = ConvergenceDiagnostics {
        chains: traces.len(),
        draws_per_chain: traces[0].mu.len(),
        warmup: config.warmup,
        divergences: traces.iter().map(|t| t.divergences).sum(),
        mean_accept_stat: traces.iter().map(|t| t.mean_accept_stat).sum::<f64>()
            / traces.len() as f64,
        step_sizes: traces.iter().map(|t| t.step_size).collect(),
        // NaN propagates as non-convergence
        max_r_hat: if mu.r_hat.is_nan() || tau.r_hat.is_nan() {
            f64::NAN
        } else {
            max_r_hat
        },
        min_ess: if mu.ess.is_nan() || tau.ess.is_nan() {
            f64::NAN
        } else {
            min_ess
        },
    };

    PosteriorSummary {
        category,
        backend: backend.to_string(),
        credible_level: config.credible_level,
        interval: config.interval,
        mu,
        tau,
        study_effects,
        diagnostics,
        k_studies: observations.len(),
    }
}
