//! Fused output of one synthesis run

use serde::Serialize;

use super::context::PipelineWarning;
use crate::algorithm::causal::{CausalPath, NodeInfluence, StructureSummary};
use crate::algorithm::cluster::{ClusterAssignment, ClusterProfile};
use crate::algorithm::integration::{CompositeRiskScore, MethodSummaryRow};
use crate::algorithm::pca::{ComponentInterpretation, ComponentLoading, ComponentScore, PcaResult};
use crate::config::{PcaConfig, SynthesisConfig};
use crate::models::estimate::{CategoryEstimate, RegressionSummary};
use crate::models::feature::ProxyFeatureVector;

/// Serializable view of a fitted decomposition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PcaSummary {
    pub eigenvalues: Vec<f64>,
    pub explained_variance_ratio: Vec<f64>,
    pub cumulative_variance: Vec<f64>,
    pub interpretations: Vec<ComponentInterpretation>,
    pub scores: Vec<ComponentScore>,
    pub loadings: Vec<ComponentLoading>,
}

impl PcaSummary {
    #[must_use]
    pub fn from_result(result: &PcaResult, config: &PcaConfig) -> Self {
        Self {
            eigenvalues: result.eigenvalues.clone(),
            explained_variance_ratio: result.explained_variance_ratio.clone(),
            cumulative_variance: result.cumulative_variance.clone(),
            interpretations: result.interpret(config.interpreted_components, config.top_loadings),
            scores: result.component_scores(),
            loadings: result.component_loadings(),
        }
    }
}

/// Everything one run produced
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisReport {
    /// RFC 3339 timestamp of the run
    pub generated_at: String,
    pub config: SynthesisConfig,
    pub panel_schema_version: String,
    pub estimates: Vec<CategoryEstimate>,
    pub features: Vec<ProxyFeatureVector>,
    pub clusters: Option<ClusterAssignment>,
    pub cluster_profiles: Vec<ClusterProfile>,
    /// Posterior state regression of the prevalence ratio, when sampled
    pub regression: Option<RegressionSummary>,
    pub pca: Option<PcaSummary>,
    pub structure: StructureSummary,
    pub paths: Vec<CausalPath>,
    pub influence: Vec<NodeInfluence>,
    pub scores: Vec<CompositeRiskScore>,
    pub method_summary: Vec<MethodSummaryRow>,
    pub warnings: Vec<PipelineWarning>,
}

impl SynthesisReport {
    /// Estimates that fell back to the classical pooler
    pub fn lower_confidence_estimates(&self) -> impl Iterator<Item = &CategoryEstimate> {
        self.estimates.iter().filter(|e| e.is_lower_confidence())
    }

    /// Score of one state, if ranked
    #[must_use]
    pub fn score_of(&self, state: &str) -> Option<&CompositeRiskScore> {
        self.scores.iter().find(|s| s.state == state)
    }

    /// Warnings raised by one stage
    pub fn warnings_for<'a>(&'a self, stage: &'a str) -> impl Iterator<Item = &'a PipelineWarning> {
        self.warnings.iter().filter(move |w| w.stage == stage)
    }
}
