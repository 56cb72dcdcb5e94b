//! Bayesian regression of the prevalence ratio on the other proxies
//!
//! ```text
//! log1p(pn_ratio_s) ~ Normal(alpha + x_s . beta, sigma^2)
//! alpha             ~ Normal(0, intercept_prior_sd^2)
//! beta_j            ~ Normal(0, coef_prior_sd^2)
//! sigma             ~ HalfNormal(sigma_prior_scale)
//! ```
//!
//! `x_s` holds the seven other proxies of state `s`, z-scored across the
//! modelled states. Only states whose proxies were all observed are
//! modelled. The sampler works on `(alpha, beta, log sigma)`.

use std::sync::Arc;

use log::{info, warn};

use super::diagnostics::interval;
use super::model::LogDensity;
use super::{BayesianBackend, ParameterTrace, SamplingRequest, default_backend, parameter_summary};
use crate::algorithm::proxy::Standardizer;
use crate::config::RegressionConfig;
use crate::error::{Result, SynthesisError};
use crate::models::estimate::{
    BayesianOutcome, ConvergenceDiagnostics, IntervalKind, RegressionCoefficient,
    RegressionSummary, StatePrediction,
};
use crate::models::feature::{ProxyFeature, ProxyFeatureVector};

/// Response of the regression
pub const TARGET: ProxyFeature = ProxyFeature::PnRatio;

/// Index of the intercept in the parameter vector
pub const INTERCEPT: usize = 0;
/// Index of the first coefficient in the parameter vector
pub const FIRST_COEF: usize = 1;

/// Every proxy except [`TARGET`], in coefficient order
#[must_use]
pub fn predictors() -> Vec<ProxyFeature> {
    ProxyFeature::ALL
        .into_iter()
        .filter(|&f| f != TARGET)
        .collect()
}

/// Standardized design, log response and priors of one fit
#[derive(Debug, Clone)]
pub struct RegressionModel {
    design: Vec<Vec<f64>>,
    response: Vec<f64>,
    intercept_prior_var: f64,
    coef_prior_var: f64,
    sigma_prior_var: f64,
}

impl RegressionModel {
    /// `design` is row-major, one row per state; `response` is on the log
    /// scale already
    #[must_use]
    pub fn new(design: Vec<Vec<f64>>, response: Vec<f64>, config: &RegressionConfig) -> Self {
        Self {
            design,
            response,
            intercept_prior_var: config.intercept_prior_sd.powi(2),
            coef_prior_var: config.coef_prior_sd.powi(2),
            sigma_prior_var: config.sigma_prior_scale.powi(2),
        }
    }

    #[must_use]
    pub fn n_coefficients(&self) -> usize {
        self.design.first().map_or(0, Vec::len)
    }

    /// Index of `log sigma` (or `sigma` in constrained draws)
    #[must_use]
    pub fn log_sigma_index(&self) -> usize {
        FIRST_COEF + self.n_coefficients()
    }

    #[must_use]
    pub fn design(&self) -> &[Vec<f64>] {
        &self.design
    }

    #[must_use]
    pub fn response(&self) -> &[f64] {
        &self.response
    }

    /// `alpha + row . beta` at one draw
    #[must_use]
    pub fn linear_predictor(&self, row: &[f64], draw: &[f64]) -> f64 {
        draw[INTERCEPT]
            + row
                .iter()
                .zip(&draw[FIRST_COEF..])
                .map(|(x, b)| x * b)
                .sum::<f64>()
    }
}

impl LogDensity for RegressionModel {
    fn dim(&self) -> usize {
        self.n_coefficients() + 2
    }

    fn log_density_grad(&self, position: &[f64], grad: &mut [f64]) -> f64 {
        let sigma_idx = self.log_sigma_index();
        let log_sigma = position[sigma_idx];
        let sigma2 = (2.0 * log_sigma).exp();
        if position.iter().any(|v| !v.is_finite()) || !sigma2.is_finite() || sigma2 == 0.0 {
            grad.fill(0.0);
            return f64::NEG_INFINITY;
        }
        let alpha = position[INTERCEPT];
        let beta = &position[FIRST_COEF..sigma_idx];

        // Priors, plus the log-Jacobian of sigma = exp(log_sigma)
        let mut logp = -0.5 * alpha * alpha / self.intercept_prior_var
            - 0.5 * sigma2 / self.sigma_prior_var
            + log_sigma;
        grad[INTERCEPT] = -alpha / self.intercept_prior_var;
        for (g, b) in grad[FIRST_COEF..sigma_idx].iter_mut().zip(beta) {
            logp -= 0.5 * b * b / self.coef_prior_var;
            *g = -b / self.coef_prior_var;
        }
        let mut d_log_sigma = 1.0 - sigma2 / self.sigma_prior_var;

        for (row, y) in self.design.iter().zip(&self.response) {
            let resid = y - self.linear_predictor(row, position);
            logp += -log_sigma - 0.5 * resid * resid / sigma2;
            grad[INTERCEPT] += resid / sigma2;
            for (g, x) in grad[FIRST_COEF..sigma_idx].iter_mut().zip(row) {
                *g += resid * x / sigma2;
            }
            d_log_sigma += resid * resid / sigma2 - 1.0;
        }
        grad[sigma_idx] = d_log_sigma;
        logp
    }
}

/// Fits the state regression over a pluggable backend
#[derive(Clone)]
pub struct BayesianStateRegression {
    config: RegressionConfig,
    backend: Option<Arc<dyn BayesianBackend>>,
}

impl std::fmt::Debug for BayesianStateRegression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BayesianStateRegression")
            .field("config", &self.config)
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .finish()
    }
}

impl BayesianStateRegression {
    #[must_use]
    pub fn new(config: RegressionConfig) -> Self {
        Self {
            config,
            backend: default_backend(),
        }
    }

    #[must_use]
    pub fn with_backend(config: RegressionConfig, backend: Arc<dyn BayesianBackend>) -> Self {
        Self {
            config,
            backend: Some(backend),
        }
    }

    #[must_use]
    pub const fn without_backend(config: RegressionConfig) -> Self {
        Self {
            config,
            backend: None,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &RegressionConfig {
        &self.config
    }

    /// Regress `log1p(pn_ratio)` on the other proxies
    ///
    /// Returns `Unavailable` when no backend can sample the model or fewer
    /// than `min_states` states have every proxy observed.
    ///
    /// # Errors
    /// * `Validation` for invalid settings or malformed backend output
    pub fn fit(&self, features: &[ProxyFeatureVector]) -> Result<BayesianOutcome<RegressionSummary>> {
        let Some(backend) = &self.backend else {
            return Ok(BayesianOutcome::Unavailable {
                reason: "no Bayesian backend compiled into this build".to_string(),
            });
        };
        if let Err(reason) = backend.availability() {
            warn!("Bayesian backend '{}' unavailable: {reason}", backend.name());
            return Ok(BayesianOutcome::Unavailable { reason });
        }
        self.config.validate()?;

        let predictors = predictors();
        let mut complete: Vec<&ProxyFeatureVector> = features
            .iter()
            .filter(|f| !f.imputed.iter().any(|&i| i) && f.values.iter().all(|v| v.is_finite()))
            .collect();
        complete.sort_by(|a, b| a.state.cmp(&b.state));
        if complete.len() < self.config.min_states {
            let reason = format!(
                "{} state(s) with every proxy observed, at least {} required",
                complete.len(),
                self.config.min_states
            );
            warn!("State regression skipped: {reason}");
            return Ok(BayesianOutcome::Unavailable { reason });
        }

        let raw: Vec<Vec<f64>> = complete
            .iter()
            .map(|f| predictors.iter().map(|&p| f.get(p)).collect())
            .collect();
        let (_, design) = Standardizer::fit_transform(&raw)?;
        let observed: Vec<f64> = complete.iter().map(|f| f.get(TARGET).max(0.0)).collect();
        let response = observed.iter().map(|y| y.ln_1p()).collect();
        let model = RegressionModel::new(design, response, &self.config);

        let request = SamplingRequest {
            chains: self.config.chains,
            draws: self.config.draws,
            warmup: self.config.warmup,
            target_accept: self.config.target_accept,
            max_tree_depth: self.config.max_tree_depth,
            seed: self.config.seed,
            show_progress: self.config.show_progress,
        };
        info!(
            "State regression: {} states, {} predictors, {} chains x {} draws with '{}'",
            complete.len(),
            predictors.len(),
            request.chains,
            request.draws,
            backend.name()
        );
        let traces = match backend.sample_regression(&model, &request) {
            Ok(traces) => traces,
            Err(SynthesisError::BackendUnavailable(reason)) => {
                warn!("State regression skipped: {reason}");
                return Ok(BayesianOutcome::Unavailable { reason });
            }
            Err(e) => return Err(e),
        };

        let dim = model.dim();
        let draws = traces.first().map_or(0, |t| t.draws.len());
        if traces.len() < 2
            || draws < 4
            || traces
                .iter()
                .any(|t| t.draws.len() != draws || t.draws.iter().any(|d| d.len() != dim))
        {
            return Err(SynthesisError::Validation(format!(
                "backend '{}' returned malformed regression traces",
                backend.name()
            )));
        }

        let summary = self.summarize(backend.name(), &model, &complete, &observed, &predictors, &traces);
        if !summary.converged {
            warn!(
                "State regression: R-hat {:.3}, ESS {:.0} outside the configured limits",
                summary.diagnostics.max_r_hat, summary.diagnostics.min_ess
            );
        }
        info!(
            "State regression finished for {} states (sigma {:.3})",
            summary.n_states,
            summary.coefficient("sigma").map_or(f64::NAN, |s| s.mean)
        );
        Ok(BayesianOutcome::Posterior(Box::new(summary)))
    }

    fn summarize(
        &self,
        backend: &str,
        model: &RegressionModel,
        states: &[&ProxyFeatureVector],
        observed: &[f64],
        predictors: &[ProxyFeature],
        traces: &[ParameterTrace],
    ) -> RegressionSummary {
        let level = self.config.interval_level;
        let column = |j: usize| -> Vec<Vec<f64>> {
            traces
                .iter()
                .map(|t| t.draws.iter().map(|d| d[j]).collect())
                .collect()
        };

        let names = std::iter::once("intercept")
            .chain(predictors.iter().map(|p| p.name()))
            .chain(std::iter::once("sigma"));
        let coefficients: Vec<RegressionCoefficient> = names
            .enumerate()
            .map(|(j, name)| RegressionCoefficient {
                parameter: name.to_string(),
                summary: parameter_summary(&column(j), level, IntervalKind::HighestDensity),
            })
            .collect();

        let predictions = states
            .iter()
            .zip(model.design())
            .zip(observed)
            .map(|((state, row), &observed)| {
                let mut linear: Vec<f64> = traces
                    .iter()
                    .flat_map(|t| &t.draws)
                    .map(|d| model.linear_predictor(row, d))
                    .collect();
                let mean = linear.iter().sum::<f64>() / linear.len() as f64;
                linear.sort_by(f64::total_cmp);
                let (low, high) = interval(&linear, level, IntervalKind::EqualTailed);
                StatePrediction {
                    state: state.state.clone(),
                    observed,
                    posterior_mean: mean.exp_m1(),
                    interval_low: low.exp_m1(),
                    interval_high: high.exp_m1(),
                }
            })
            .collect();

        // NaN propagates as non-convergence
        let max_r_hat = coefficients
            .iter()
            .map(|c| c.summary.r_hat)
            .fold(f64::NEG_INFINITY, |a, b| if a.is_nan() || b.is_nan() { f64::NAN } else { a.max(b) });
        let min_ess = coefficients
            .iter()
            .map(|c| c.summary.ess)
            .fold(f64::INFINITY, |a, b| if a.is_nan() || b.is_nan() { f64::NAN } else { a.min(b) });
        let converged = max_r_hat.is_finite()
            && max_r_hat <= self.config.max_r_hat
            && min_ess.is_finite()
            && min_ess >= self.config.min_ess;

        RegressionSummary {
            backend: backend.to_string(),
            target: TARGET.name().to_string(),
            predictors: predictors.iter().map(|p| p.name().to_string()).collect(),
            n_states: states.len(),
            interval_level: level,
            coefficients,
            predictions,
            diagnostics: ConvergenceDiagnostics {
                chains: traces.len(),
                draws_per_chain: traces[0].draws.len(),
                warmup: self.config.warmup,
                divergences: traces.iter().map(|t| t.divergences).sum(),
                mean_accept_stat: traces.iter().map(|t| t.mean_accept_stat).sum::<f64>()
                    / traces.len() as f64,
                step_sizes: traces.iter().map(|t| t.step_size).collect(),
                max_r_hat,
                min_ess,
            },
            converged,
        }
    }
}
