//! Structural summary of a causal DAG

use petgraph::Direction;
use serde::Serialize;

use super::graph::CausalGraph;
use super::paths::enumerate_paths;

/// How an outcome is reached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomePathways {
    pub outcome: String,
    pub direct_causes: Vec<String>,
    /// Ancestors that are not parents
    pub indirect_causes: Vec<String>,
    /// Simple paths reaching the outcome from a non-outcome node; the same
    /// paths [`enumerate_paths`] returns for this outcome
    pub total_pathways: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureSummary {
    pub nodes: usize,
    pub edges: usize,
    /// `e / (n (n - 1))`
    pub density: f64,
    pub max_in_degree: usize,
    pub max_out_degree: usize,
    pub pathways: Vec<OutcomePathways>,
}

/// Summarize node/edge counts, degrees and per-outcome pathways
#[must_use]
pub fn structure_summary(graph: &CausalGraph) -> StructureSummary {
    let n = graph.node_count();
    let e = graph.edge_count();
    let density = if n > 1 {
        e as f64 / (n * (n - 1)) as f64
    } else {
        0.0
    };

    let degree = |direction| {
        graph
            .graph
            .node_indices()
            .map(|idx| graph.graph.neighbors_directed(idx, direction).count())
            .max()
            .unwrap_or(0)
    };

    let outcomes = graph.outcomes();
    let paths = enumerate_paths(graph, &outcomes).unwrap_or_default();
    let pathways = outcomes
        .iter()
        .map(|&outcome| {
            let direct: Vec<String> = graph
                .parents(outcome)
                .unwrap_or_default()
                .into_iter()
                .map(str::to_string)
                .collect();
            let indirect: Vec<String> = graph
                .ancestors(outcome)
                .unwrap_or_default()
                .into_iter()
                .filter(|a| !direct.iter().any(|d| d == a))
                .map(str::to_string)
                .collect();
            let total_pathways = paths.iter().filter(|p| p.outcome == outcome).count();
            OutcomePathways {
                outcome: outcome.to_string(),
                direct_causes: direct,
                indirect_causes: indirect,
                total_pathways,
            }
        })
        .collect();

    StructureSummary {
        nodes: n,
        edges: e,
        density,
        max_in_degree: degree(Direction::Incoming),
        max_out_degree: degree(Direction::Outgoing),
        pathways,
    }
}
