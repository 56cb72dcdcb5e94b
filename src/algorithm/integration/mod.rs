//! Fusion of the method outputs into a state priority ranking
//!
//! The composite score is a fixed, versioned linear combination:
//!
//! ```text
//! score = w_ratio * pn_ratio + w_poverty * poverty_pct + w_symptomatic * symptomatic_no_care_pct
//! ```
//!
//! computed on the imputed, unstandardized indicators. The default weights
//! are 0.4 / 0.3 / 0.3 at version `v1`.

use std::cmp::Ordering;

use log::info;
use serde::Serialize;

use crate::algorithm::causal::{NodeInfluence, StructureSummary};
use crate::algorithm::cluster::{ClusterAssignment, ClusterLabel};
use crate::algorithm::pca::PcaResult;
use crate::config::{CausalConfig, ScoreWeights};
use crate::error::{Result, SynthesisError};
use crate::models::delay::DelayCategory;
use crate::models::estimate::{CategoryEstimate, EstimateSource};
use crate::models::feature::{ProxyFeature, ProxyFeatureVector};

/// Ranked risk of one state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeRiskScore {
    pub state: String,
    pub composite_score: f64,
    /// 1 = highest risk
    pub priority_rank: usize,
    pub pn_ratio: f64,
    pub poverty_pct: f64,
    pub symptomatic_no_care_pct: f64,
    pub cluster: Option<ClusterLabel>,
    pub pc1: Option<f64>,
    pub pc2: Option<f64>,
    /// Causal influence of the delay-ratio node
    pub ratio_influence: Option<f64>,
    /// Causal influence of the poverty node
    pub poverty_influence: Option<f64>,
    /// Headline pooled total delay in days, shared by every state
    pub pooled_total_delay: Option<f64>,
    pub weights_version: String,
}

/// One row of the cross-method summary table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodSummaryRow {
    pub method: String,
    pub metric: String,
    pub value: f64,
    pub uncertainty: String,
    pub confidence: String,
    /// Studies, states or nodes behind the value
    pub n: usize,
}

/// Weighted sum of the three score inputs
#[must_use]
pub fn composite_score(weights: &ScoreWeights, ratio: f64, poverty: f64, symptomatic: f64) -> f64 {
    weights.ratio * ratio + weights.poverty * poverty + weights.symptomatic * symptomatic
}

/// Combines pooled delays, typologies, components and causal influence
#[derive(Debug, Clone, Default)]
pub struct EvidenceIntegrator {
    weights: ScoreWeights,
    causal: CausalConfig,
}

impl EvidenceIntegrator {
    #[must_use]
    pub const fn new(weights: ScoreWeights, causal: CausalConfig) -> Self {
        Self { weights, causal }
    }

    #[must_use]
    pub const fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Score and rank every state
    ///
    /// Missing optional inputs (no clustering, no PCA, no influence) leave
    /// the matching fields empty; the score itself only needs `features`.
    ///
    /// # Errors
    /// `Validation` if a weight is not finite
    pub fn integrate(
        &self,
        pooled: &[CategoryEstimate],
        clusters: Option<&ClusterAssignment>,
        components: Option<&PcaResult>,
        influence: &[NodeInfluence],
        features: &[ProxyFeatureVector],
    ) -> Result<Vec<CompositeRiskScore>> {
        let w = &self.weights;
        if ![w.ratio, w.poverty, w.symptomatic].iter().all(|v| v.is_finite()) {
            return Err(SynthesisError::Validation(format!(
                "composite weights {} are not finite",
                w.version
            )));
        }

        let influence_of = |node: &str| {
            influence
                .iter()
                .find(|i| i.node == node)
                .map(|i| i.weighted_influence)
        };
        let ratio_influence = influence_of(&self.causal.ratio_node);
        let poverty_influence = influence_of(&self.causal.poverty_node);
        let pooled_total_delay = pooled
            .iter()
            .find(|e| e.category == DelayCategory::Total)
            .map(CategoryEstimate::value);

        let mut scores: Vec<CompositeRiskScore> = features
            .iter()
            .map(|f| {
                let pn_ratio = f.get(ProxyFeature::PnRatio);
                let poverty_pct = f.get(ProxyFeature::PovertyPct);
                let symptomatic = f.get(ProxyFeature::SymptomaticNoCarePct);
                CompositeRiskScore {
                    state: f.state.clone(),
                    composite_score: composite_score(w, pn_ratio, poverty_pct, symptomatic),
                    priority_rank: 0,
                    pn_ratio,
                    poverty_pct,
                    symptomatic_no_care_pct: symptomatic,
                    cluster: clusters.and_then(|c| c.label_of(&f.state)),
                    pc1: components.and_then(|p| p.score(&f.state, 1)),
                    pc2: components.and_then(|p| p.score(&f.state, 2)),
                    ratio_influence,
                    poverty_influence,
                    pooled_total_delay,
                    weights_version: w.version.clone(),
                }
            })
            .collect();

        scores.sort_by(|a, b| match b.composite_score.total_cmp(&a.composite_score) {
            Ordering::Equal => a.state.cmp(&b.state),
            other => other,
        });
        for (rank, score) in scores.iter_mut().enumerate() {
            score.priority_rank = rank + 1;
        }

        if let Some(top) = scores.first() {
            info!(
                "Ranked {} states with weights {}; highest priority: {} ({:.2})",
                scores.len(),
                w.version,
                top.state,
                top.composite_score
            );
        }
        Ok(scores)
    }

    /// Cross-method summary: pooled delays, PCA variance and DAG density
    #[must_use]
    pub fn method_summary(
        &self,
        pooled: &[CategoryEstimate],
        components: Option<&PcaResult>,
        structure: Option<&StructureSummary>,
    ) -> Vec<MethodSummaryRow> {
        let mut rows = Vec::new();

        for estimate in pooled {
            let (low, high) = estimate.interval();
            let (method, confidence, n) = match (&estimate.source, &estimate.bayesian) {
                (EstimateSource::Bayesian, Some(posterior)) => (
                    "MCMC Bayesian",
                    format!("{:.0}% {}", posterior.credible_level * 100.0, posterior.interval.label()),
                    posterior.k_studies,
                ),
                (EstimateSource::ClassicalFallback { .. }, _) => (
                    "DerSimonian-Laird (Bayesian fallback)",
                    "95% CI, lower confidence".to_string(),
                    estimate.classical.k_studies,
                ),
                _ => (
                    "DerSimonian-Laird",
                    "95% CI".to_string(),
                    estimate.classical.k_studies,
                ),
            };
            rows.push(MethodSummaryRow {
                method: method.to_string(),
                metric: estimate.category.label().to_string(),
                value: estimate.value(),
                uncertainty: format!("{low:.1} - {high:.1}"),
                confidence,
                n,
            });
        }

        if let Some(pca) = components {
            for (c, ratio) in pca.explained_variance_ratio.iter().enumerate() {
                rows.push(MethodSummaryRow {
                    method: "PCA".to_string(),
                    metric: format!("PC{} explained variance", c + 1),
                    value: *ratio,
                    uncertainty: "N/A".to_string(),
                    confidence: "Deterministic".to_string(),
                    n: pca.states.len(),
                });
            }
        }

        if let Some(summary) = structure {
            rows.push(MethodSummaryRow {
                method: "DAG".to_string(),
                metric: "Network density".to_string(),
                value: summary.density,
                uncertainty: "N/A".to_string(),
                confidence: "Topological".to_string(),
                n: summary.nodes,
            });
        }
        rows
    }
}
