//! Causal graph of delay determinants
//!
//! An explicit, evidence-typed DAG over the proxy indicators. The graph is
//! an encoding of assumptions drawn from the literature; nothing here
//! learns structure from data.

pub mod graph;
pub mod paths;
pub mod structure;

use crate::config::CausalConfig;
use crate::error::Result;
use crate::models::feature::ProxyFeature;

pub use graph::{CausalEdge, CausalGraph, CausalNode, EvidenceStrength, NodeCategory};
pub use paths::{
    CausalPath, NodeInfluence, enumerate_mediated_paths, enumerate_paths, influence,
    influence_scores,
};
pub use structure::{OutcomePathways, StructureSummary, structure_summary};

/// Nodes of the default delay model with their roles
#[must_use]
pub fn default_delay_nodes() -> Vec<CausalNode> {
    use NodeCategory::{Outcome, RiskFactor, Socioeconomic, SystemFactor};
    use ProxyFeature::*;
    [
        (PovertyPct, Socioeconomic),
        (LiteracyPct, Socioeconomic),
        (SymptomaticNoCarePct, RiskFactor),
        (PrivateFirstProviderPct, RiskFactor),
        (BactConfirmedPct, SystemFactor),
        (CrowdingIndex, SystemFactor),
        (InRatio, Outcome),
        (PnRatio, Outcome),
    ]
    .into_iter()
    .map(|(feature, category)| CausalNode::new(feature.name(), category))
    .collect()
}

/// Edges of the default delay model
#[must_use]
pub fn default_delay_edges() -> Vec<CausalEdge> {
    use EvidenceStrength::{Moderate, Strong, Weak};
    use ProxyFeature::*;
    [
        // socioeconomic to risk factors
        (PovertyPct, SymptomaticNoCarePct, Strong),
        (LiteracyPct, PrivateFirstProviderPct, Moderate),
        (LiteracyPct, BactConfirmedPct, Moderate),
        // socioeconomic to system factors
        (LiteracyPct, CrowdingIndex, Weak),
        (PovertyPct, CrowdingIndex, Moderate),
        // risk and system factors to delay
        (SymptomaticNoCarePct, PnRatio, Strong),
        (PrivateFirstProviderPct, PnRatio, Moderate),
        (BactConfirmedPct, PnRatio, Strong),
        (CrowdingIndex, PnRatio, Moderate),
        // system factors to incidence
        (BactConfirmedPct, InRatio, Moderate),
        (CrowdingIndex, InRatio, Weak),
        (InRatio, PnRatio, Strong),
    ]
    .into_iter()
    .map(|(source, target, strength)| CausalEdge::new(source.name(), target.name(), strength))
    .collect()
}

/// Builds causal graphs and answers path and influence queries on them
#[derive(Debug, Clone, Default)]
pub struct CausalGraphEngine {
    config: CausalConfig,
}

impl CausalGraphEngine {
    #[must_use]
    pub const fn new(config: CausalConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &CausalConfig {
        &self.config
    }

    /// Build a DAG from edges; fails with `CyclicGraph` on any cycle
    pub fn build(&self, edges: &[CausalEdge]) -> Result<CausalGraph> {
        CausalGraph::build(edges, self.config.max_nodes)
    }

    /// Build a DAG from declared nodes and edges
    pub fn build_with_nodes(&self, nodes: &[CausalNode], edges: &[CausalEdge]) -> Result<CausalGraph> {
        CausalGraph::build_with_nodes(nodes, edges, self.config.max_nodes)
    }

    /// The 8-node, 12-edge delay model
    pub fn default_delay_dag(&self) -> Result<CausalGraph> {
        self.build_with_nodes(&default_delay_nodes(), &default_delay_edges())
    }

    pub fn enumerate_paths(&self, graph: &CausalGraph, outcomes: &[&str]) -> Result<Vec<CausalPath>> {
        enumerate_paths(graph, outcomes)
    }

    pub fn enumerate_mediated_paths(
        &self,
        graph: &CausalGraph,
        outcomes: &[&str],
    ) -> Result<Vec<CausalPath>> {
        enumerate_mediated_paths(graph, outcomes)
    }

    pub fn influence(&self, graph: &CausalGraph, node: &str) -> Result<f64> {
        influence(graph, node)
    }

    #[must_use]
    pub fn influence_scores(&self, graph: &CausalGraph) -> Vec<NodeInfluence> {
        influence_scores(graph)
    }

    #[must_use]
    pub fn structure_summary(&self, graph: &CausalGraph) -> StructureSummary {
        structure_summary(graph)
    }
}
