//! Principal component analysis of the standardized proxy features
//!
//! The full eigendecomposition of the sample covariance is kept, so the
//! explained-variance ratios sum to one and the inverse transform
//! reconstructs the standardized input exactly.

use log::info;
use nalgebra::DMatrix;
use serde::Serialize;

use crate::algorithm::proxy::Standardizer;
use crate::config::PcaConfig;
use crate::error::{Result, SynthesisError};
use crate::models::feature::{ProxyFeature, ProxyFeatureVector, feature_rows};

/// Score of one state on one component (components are 1-based)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentScore {
    pub state: String,
    pub component: usize,
    pub score: f64,
}

/// Loading of one feature on one component (components are 1-based)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentLoading {
    pub feature: String,
    pub component: usize,
    pub loading: f64,
}

/// Human-readable label of a component
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentInterpretation {
    pub component: usize,
    pub explained_variance_ratio: f64,
    pub cumulative_variance: f64,
    /// Features with the largest absolute loadings, strongest first
    pub top_features: Vec<String>,
    pub description: String,
}

/// Fitted decomposition
#[derive(Debug, Clone, PartialEq)]
pub struct PcaResult {
    pub states: Vec<String>,
    pub feature_names: Vec<String>,
    /// Scaler fitted on the raw features
    pub scaler: Standardizer,
    /// Component variances, descending
    pub eigenvalues: Vec<f64>,
    /// `loadings[c][f]`: unit-norm component vectors, one row per component
    pub loadings: Vec<Vec<f64>>,
    /// `scores[s][c]`: projection of state `s` on component `c`
    pub scores: Vec<Vec<f64>>,
    pub explained_variance_ratio: Vec<f64>,
    pub cumulative_variance: Vec<f64>,
}

impl PcaResult {
    /// Number of components
    #[must_use]
    pub fn n_components(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Project standardized rows onto the components
    #[must_use]
    pub fn transform(&self, standardized: &[Vec<f64>]) -> Vec<Vec<f64>> {
        standardized
            .iter()
            .map(|row| {
                self.loadings
                    .iter()
                    .map(|component| component.iter().zip(row).map(|(l, x)| l * x).sum())
                    .collect()
            })
            .collect()
    }

    /// Map component scores back to standardized feature space
    #[must_use]
    pub fn inverse_transform(&self, scores: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let width = self.feature_names.len();
        scores
            .iter()
            .map(|row| {
                let mut x = vec![0.0; width];
                for (score, component) in row.iter().zip(&self.loadings) {
                    for (xi, l) in x.iter_mut().zip(component) {
                        *xi += score * l;
                    }
                }
                x
            })
            .collect()
    }

    /// Score of a state on a 1-based component
    #[must_use]
    pub fn score(&self, state: &str, component: usize) -> Option<f64> {
        let row = self.states.iter().position(|s| s == state)?;
        self.scores.get(row)?.get(component.checked_sub(1)?).copied()
    }

    /// Long-format scores
    #[must_use]
    pub fn component_scores(&self) -> Vec<ComponentScore> {
        self.states
            .iter()
            .zip(&self.scores)
            .flat_map(|(state, row)| {
                row.iter().enumerate().map(move |(c, &score)| ComponentScore {
                    state: state.clone(),
                    component: c + 1,
                    score,
                })
            })
            .collect()
    }

    /// Long-format loadings
    #[must_use]
    pub fn component_loadings(&self) -> Vec<ComponentLoading> {
        self.loadings
            .iter()
            .enumerate()
            .flat_map(|(c, component)| {
                self.feature_names
                    .iter()
                    .zip(component)
                    .map(move |(feature, &loading)| ComponentLoading {
                        feature: feature.clone(),
                        component: c + 1,
                        loading,
                    })
            })
            .collect()
    }

    /// Name the dominant features of the first `components` components
    #[must_use]
    pub fn interpret(&self, components: usize, top: usize) -> Vec<ComponentInterpretation> {
        self.loadings
            .iter()
            .take(components)
            .enumerate()
            .map(|(c, component)| {
                let mut order: Vec<usize> = (0..component.len()).collect();
                order.sort_by(|&a, &b| component[b].abs().total_cmp(&component[a].abs()));
                let top_features: Vec<String> = order
                    .iter()
                    .take(top)
                    .map(|&f| self.feature_names[f].clone())
                    .collect();
                let ratio = self.explained_variance_ratio[c];
                ComponentInterpretation {
                    component: c + 1,
                    explained_variance_ratio: ratio,
                    cumulative_variance: self.cumulative_variance[c],
                    description: format!(
                        "PC{} ({:.1}%): strongest loadings from {}",
                        c + 1,
                        ratio * 100.0,
                        top_features.join(", ")
                    ),
                    top_features,
                }
            })
            .collect()
    }
}

/// Eigendecomposition of an already standardized matrix
///
/// # Errors
/// `InsufficientData` for fewer than two rows or zero total variance
pub fn decompose(standardized: &[Vec<f64>]) -> Result<(Vec<f64>, Vec<Vec<f64>>)> {
    let n = standardized.len();
    if n < 2 {
        return Err(SynthesisError::insufficient(
            "PCA",
            format!("{n} state(s); at least 2 are required"),
        ));
    }
    let width = standardized[0].len();

    let mut means = vec![0.0; width];
    for row in standardized {
        for (m, v) in means.iter_mut().zip(row) {
            *m += v / n as f64;
        }
    }
    let covariance = DMatrix::from_fn(width, width, |i, j| {
        standardized
            .iter()
            .map(|row| (row[i] - means[i]) * (row[j] - means[j]))
            .sum::<f64>()
            / (n - 1) as f64
    });

    let total_variance = covariance.trace();
    if total_variance <= f64::EPSILON {
        return Err(SynthesisError::insufficient(
            "PCA",
            "the feature matrix has no variance",
        ));
    }

    let eigen = covariance.symmetric_eigen();
    let mut order: Vec<usize> = (0..width).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let mut eigenvalues = Vec::with_capacity(width);
    let mut loadings = Vec::with_capacity(width);
    for idx in order {
        // Round-off can leave tiny negative eigenvalues
        eigenvalues.push(eigen.eigenvalues[idx].max(0.0));
        let mut vector: Vec<f64> = eigen.eigenvectors.column(idx).iter().copied().collect();
        let dominant = vector
            .iter()
            .copied()
            .fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best });
        if dominant < 0.0 {
            vector.iter_mut().for_each(|v| *v = -*v);
        }
        loadings.push(vector);
    }
    Ok((eigenvalues, loadings))
}

/// Reduces proxy features to principal components
#[derive(Debug, Clone, Default)]
pub struct ComponentReducer {
    config: PcaConfig,
}

impl ComponentReducer {
    #[must_use]
    pub const fn new(config: PcaConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &PcaConfig {
        &self.config
    }

    /// Standardize the features and decompose their covariance
    pub fn reduce(&self, features: &[ProxyFeatureVector]) -> Result<PcaResult> {
        if features.len() < 2 {
            return Err(SynthesisError::insufficient(
                "PCA",
                format!("{} state(s); at least 2 are required", features.len()),
            ));
        }
        let (scaler, standardized) = Standardizer::fit_transform(&feature_rows(features))?;
        let (eigenvalues, loadings) = decompose(&standardized)?;

        let total: f64 = eigenvalues.iter().sum();
        let explained_variance_ratio: Vec<f64> = eigenvalues.iter().map(|e| e / total).collect();
        let cumulative_variance: Vec<f64> = explained_variance_ratio
            .iter()
            .scan(0.0, |acc, r| {
                *acc += r;
                Some(*acc)
            })
            .collect();

        let mut result = PcaResult {
            states: features.iter().map(|f| f.state.clone()).collect(),
            feature_names: ProxyFeature::ALL.iter().map(|f| f.name().to_string()).collect(),
            scaler,
            eigenvalues,
            loadings,
            scores: Vec::new(),
            explained_variance_ratio,
            cumulative_variance,
        };
        result.scores = result.transform(&standardized);

        let leading: Vec<String> = result
            .cumulative_variance
            .iter()
            .take(3)
            .map(|c| format!("{c:.3}"))
            .collect();
        info!(
            "PCA on {} states: cumulative variance of leading components {}",
            features.len(),
            leading.join(", ")
        );
        Ok(result)
    }
}
