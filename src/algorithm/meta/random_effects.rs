//! DerSimonian-Laird random-effects pooling
//!
//! Closed-form estimate of the between-study variance followed by
//! inverse-variance weighting with the inflated variances.

use log::{info, warn};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::config::PoolingConfig;
use crate::error::{Result, SynthesisError};
use crate::models::delay::{DelayCategory, DelayObservation, DelayRecordStore};
use crate::models::estimate::PooledEstimate;

/// Classical random-effects pooler
#[derive(Debug, Clone, Default)]
pub struct RandomEffectsPooler {
    config: PoolingConfig,
}

impl RandomEffectsPooler {
    #[must_use]
    pub const fn new(config: PoolingConfig) -> Self {
        Self { config }
    }

    /// Pool the observations of one delay category
    ///
    /// All observations must share a category. A single study yields
    /// `tau^2 = 0` and its own effect and SE.
    pub fn pool(&self, observations: &[DelayObservation]) -> Result<PooledEstimate> {
        let usable: Vec<&DelayObservation> = observations
            .iter()
            .filter(|o| o.variance.is_finite() && o.variance > 0.0 && o.effect.is_finite())
            .collect();

        let Some(first) = usable.first() else {
            return Err(SynthesisError::insufficient(
                "random-effects pooling",
                "no observation with a positive variance",
            ));
        };
        let category = first.category;
        if usable.iter().any(|o| o.category != category) {
            return Err(SynthesisError::Validation(
                "observations passed to one pooling call span several delay categories"
                    .to_string(),
            ));
        }
        if usable.len() < observations.len() {
            warn!(
                "{category}: {} observation(s) without a positive variance ignored",
                observations.len() - usable.len()
            );
        }

        let effects: Vec<f64> = usable.iter().map(|o| o.effect).collect();
        let variances: Vec<f64> = usable.iter().map(|o| o.variance).collect();
        let stats = dersimonian_laird(&effects, &variances, self.config.z_multiplier);

        Ok(PooledEstimate {
            category,
            point_estimate: stats.pooled,
            standard_error: stats.standard_error,
            interval_low: stats.interval_low,
            interval_high: stats.interval_high,
            heterogeneity_tau_squared: stats.tau_squared,
            q_statistic: stats.q,
            i_squared: stats.i_squared,
            q_p_value: stats.q_p_value,
            k_studies: stats.k,
        })
    }

    /// Pool every category present in the store
    ///
    /// Categories without usable observations are omitted, never reported
    /// as a fabricated zero.
    #[must_use]
    pub fn pool_store(&self, store: &DelayRecordStore) -> Vec<PooledEstimate> {
        let mut results = Vec::new();
        for category in DelayCategory::ALL {
            let observations = store.by_category(category);
            match self.pool(&observations) {
                Ok(estimate) => {
                    info!(
                        "{}: pooled {:.2} days [{:.2}, {:.2}] from {} studies (tau^2 = {:.3})",
                        category,
                        estimate.point_estimate,
                        estimate.interval_low,
                        estimate.interval_high,
                        estimate.k_studies,
                        estimate.heterogeneity_tau_squared
                    );
                    results.push(estimate);
                }
                Err(e) => warn!("{category}: omitted from pooled output: {e}"),
            }
        }
        results
    }
}

/// Intermediate and final quantities of the DerSimonian-Laird estimator
#[derive(Debug, Clone, PartialEq)]
pub struct DerSimonianLaird {
    pub fixed_effect: f64,
    pub q: f64,
    pub c: f64,
    pub tau_squared: f64,
    pub pooled: f64,
    pub standard_error: f64,
    pub interval_low: f64,
    pub interval_high: f64,
    pub i_squared: f64,
    pub q_p_value: Option<f64>,
    pub k: usize,
}

/// DerSimonian-Laird estimator over parallel slices of effects and variances
///
/// Callers guarantee non-empty input with strictly positive variances.
#[must_use]
pub fn dersimonian_laird(effects: &[f64], variances: &[f64], z: f64) -> DerSimonianLaird {
    let k = effects.len();
    let weights: Vec<f64> = variances.iter().map(|v| 1.0 / v).collect();
    let sum_w: f64 = weights.iter().sum();
    let sum_w2: f64 = weights.iter().map(|w| w * w).sum();

    let fixed_effect = weights
        .iter()
        .zip(effects)
        .map(|(w, y)| w * y)
        .sum::<f64>()
        / sum_w;

    let q: f64 = weights
        .iter()
        .zip(effects)
        .map(|(w, y)| w * (y - fixed_effect).powi(2))
        .sum();
    let df = k.saturating_sub(1) as f64;
    let c = sum_w - sum_w2 / sum_w;
    let tau_squared = if c > 0.0 { ((q - df) / c).max(0.0) } else { 0.0 };

    let random_weights: Vec<f64> = variances.iter().map(|v| 1.0 / (v + tau_squared)).collect();
    let sum_rw: f64 = random_weights.iter().sum();
    let pooled = random_weights
        .iter()
        .zip(effects)
        .map(|(w, y)| w * y)
        .sum::<f64>()
        / sum_rw;
    let standard_error = (1.0 / sum_rw).sqrt();

    let i_squared = if q > 0.0 { ((q - df) / q).max(0.0) } else { 0.0 };
    let q_p_value = if df > 0.0 {
        ChiSquared::new(df).ok().map(|dist| dist.sf(q))
    } else {
        None
    };

    DerSimonianLaird {
        fixed_effect,
        q,
        c,
        tau_squared,
        pooled,
        standard_error,
        interval_low: pooled - z * standard_error,
        interval_high: pooled + z * standard_error,
        i_squared,
        q_p_value,
        k,
    }
}
