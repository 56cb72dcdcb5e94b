//! Log posterior of the hierarchical random-effects model
//!
//! ```text
//! y_i     ~ Normal(theta_i, s_i^2)
//! theta_i ~ Normal(mu, tau^2)
//! mu      ~ Normal(0, mu_prior_sd^2)
//! tau     ~ HalfNormal(tau_prior_scale)
//! ```
//!
//! The study effects are integrated out (`y_i ~ Normal(mu, s_i^2 + tau^2)`)
//! and the sampler works on `(mu, log tau)`. The marginal posterior of
//! `(mu, tau)` is unchanged; `theta_i` is recovered from its conditional
//! Normal given each draw.

/// A differentiable log density on an unconstrained space
pub trait LogDensity: Sync {
    /// Number of unconstrained parameters
    fn dim(&self) -> usize;

    /// Log density at `position` (up to a constant); writes the gradient
    /// into `grad`. Returns a non-finite value outside the support.
    fn log_density_grad(&self, position: &[f64], grad: &mut [f64]) -> f64;
}

/// Data and priors of one category's meta-analysis
#[derive(Debug, Clone)]
pub struct HierarchicalModel {
    effects: Vec<f64>,
    variances: Vec<f64>,
    mu_prior_var: f64,
    tau_prior_var: f64,
}

/// Index of `mu` in the unconstrained parameter vector
pub const MU: usize = 0;
/// Index of `log tau` in the unconstrained parameter vector
pub const LOG_TAU: usize = 1;

impl HierarchicalModel {
    #[must_use]
    pub fn new(effects: Vec<f64>, variances: Vec<f64>, mu_prior_sd: f64, tau_prior_scale: f64) -> Self {
        Self {
            effects,
            variances,
            mu_prior_var: mu_prior_sd * mu_prior_sd,
            tau_prior_var: tau_prior_scale * tau_prior_scale,
        }
    }

    #[must_use]
    pub fn effects(&self) -> &[f64] {
        &self.effects
    }

    #[must_use]
    pub fn variances(&self) -> &[f64] {
        &self.variances
    }

    /// Conditional mean and variance of study `i`'s true effect given `(mu, tau)`
    ///
    /// A `tau` too small for `1 / tau^2` to be finite pins the effect at `mu`.
    #[must_use]
    pub fn study_conditional(&self, i: usize, mu: f64, tau: f64) -> (f64, f64) {
        let prior_precision = 1.0 / (tau * tau);
        if !prior_precision.is_finite() {
            return (mu, 0.0);
        }
        let data_precision = 1.0 / self.variances[i];
        let precision = data_precision + prior_precision;
        let mean = (self.effects[i] * data_precision + mu * prior_precision) / precision;
        (mean, 1.0 / precision)
    }
}

impl LogDensity for HierarchicalModel {
    fn dim(&self) -> usize {
        2
    }

    fn log_density_grad(&self, position: &[f64], grad: &mut [f64]) -> f64 {
        let mu = position[MU];
        let log_tau = position[LOG_TAU];
        let tau = log_tau.exp();
        let tau2 = tau * tau;
        if !mu.is_finite() || !tau2.is_finite() {
            grad.fill(0.0);
            return f64::NEG_INFINITY;
        }

        // Priors, plus the log-Jacobian of tau = exp(log_tau)
        let mut logp = -0.5 * mu * mu / self.mu_prior_var - 0.5 * tau2 / self.tau_prior_var + log_tau;
        let mut d_mu = -mu / self.mu_prior_var;
        let mut d_log_tau = 1.0 - tau2 / self.tau_prior_var;

        for (y, s2) in self.effects.iter().zip(&self.variances) {
            let v = s2 + tau2;
            let resid = y - mu;
            logp += -0.5 * v.ln() - 0.5 * resid * resid / v;
            d_mu += resid / v;
            d_log_tau += tau2 * (resid * resid / (v * v) - 1.0 / v);
        }

        grad[MU] = d_mu;
        grad[LOG_TAU] = d_log_tau;
        logp
    }
}
