//! Path enumeration and evidence-weighted influence
//!
//! Both walk every simple path, so their cost grows with the number of
//! paths. Graphs are capped in size at construction.

use std::cmp::Ordering;

use petgraph::algo::all_simple_paths;
use petgraph::graph::NodeIndex;
use serde::Serialize;
use smallvec::SmallVec;

use super::graph::{CausalGraph, EvidenceStrength, NodeCategory};
use crate::error::Result;

/// One simple path ending at an outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CausalPath {
    pub outcome: String,
    pub source: String,
    /// Node names from source to outcome
    pub nodes: Vec<String>,
    /// Strength of each edge along the path
    pub strengths: Vec<EvidenceStrength>,
    /// Mean edge weight along the path
    pub evidence_score: f64,
}

impl CausalPath {
    /// Number of edges
    #[must_use]
    pub fn length(&self) -> usize {
        self.strengths.len()
    }

    /// True when the path passes through at least one intermediate node
    #[must_use]
    pub fn is_mediated(&self) -> bool {
        self.nodes.len() > 2
    }

    /// `a -> b -> c`
    #[must_use]
    pub fn describe(&self) -> String {
        self.nodes.join(" -> ")
    }

    /// `strong, moderate`
    #[must_use]
    pub fn describe_strengths(&self) -> String {
        self.strengths
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Influence of one node on everything downstream of it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeInfluence {
    pub node: String,
    pub category: NodeCategory,
    /// Number of reachable nodes
    pub descendants: usize,
    /// Sum over descendants and paths of the mean edge weight
    pub weighted_influence: f64,
}

/// Inline storage for short paths
type NodePath = SmallVec<[NodeIndex; 8]>;

fn simple_paths(graph: &CausalGraph, from: NodeIndex, to: NodeIndex) -> Vec<NodePath> {
    all_simple_paths::<NodePath, _>(&graph.graph, from, to, 0, None).collect()
}

fn path_strengths(graph: &CausalGraph, path: &[NodeIndex]) -> Vec<EvidenceStrength> {
    path.windows(2)
        .filter_map(|pair| graph.graph.find_edge(pair[0], pair[1]))
        .map(|e| graph.graph[e])
        .collect()
}

fn mean_weight(strengths: &[EvidenceStrength]) -> f64 {
    if strengths.is_empty() {
        return 0.0;
    }
    strengths.iter().map(|s| s.weight()).sum::<f64>() / strengths.len() as f64
}

fn path_order(a: &CausalPath, b: &CausalPath) -> Ordering {
    a.outcome
        .cmp(&b.outcome)
        .then_with(|| b.evidence_score.total_cmp(&a.evidence_score))
        .then_with(|| a.length().cmp(&b.length()))
        .then_with(|| a.nodes.cmp(&b.nodes))
}

/// Every simple path from a non-outcome node to each of `outcomes`
///
/// Sorted by outcome, evidence score (descending), then length.
///
/// # Errors
/// `Validation` if an outcome is not a node of the graph
pub fn enumerate_paths(graph: &CausalGraph, outcomes: &[&str]) -> Result<Vec<CausalPath>> {
    let targets: Vec<NodeIndex> = outcomes
        .iter()
        .map(|o| graph.index_of(o))
        .collect::<Result<_>>()?;

    let mut paths = Vec::new();
    for &target in &targets {
        for source in graph.graph.node_indices() {
            if targets.contains(&source) {
                continue;
            }
            for path in simple_paths(graph, source, target) {
                let strengths = path_strengths(graph, &path);
                paths.push(CausalPath {
                    outcome: graph.name(target).to_string(),
                    source: graph.name(source).to_string(),
                    nodes: path.iter().map(|&n| graph.name(n).to_string()).collect(),
                    evidence_score: mean_weight(&strengths),
                    strengths,
                });
            }
        }
    }
    paths.sort_by(path_order);
    Ok(paths)
}

/// Paths from [`enumerate_paths`] with at least one intermediate node
pub fn enumerate_mediated_paths(graph: &CausalGraph, outcomes: &[&str]) -> Result<Vec<CausalPath>> {
    let mut paths = enumerate_paths(graph, outcomes)?;
    paths.retain(CausalPath::is_mediated);
    Ok(paths)
}

fn weighted_influence(graph: &CausalGraph, idx: NodeIndex) -> (usize, f64) {
    let descendants = graph.descendant_indices(idx);
    let total = descendants
        .iter()
        .flat_map(|&d| simple_paths(graph, idx, d))
        .map(|path| mean_weight(&path_strengths(graph, &path)))
        .sum();
    (descendants.len(), total)
}

/// Evidence-weighted influence of `node` on its descendants
///
/// Each simple path from `node` to any descendant contributes the mean
/// weight of its edges. A sink has influence 0.
pub fn influence(graph: &CausalGraph, node: &str) -> Result<f64> {
    let idx = graph.index_of(node)?;
    Ok(weighted_influence(graph, idx).1)
}

/// [`influence`] of every node, in topological order
#[must_use]
pub fn influence_scores(graph: &CausalGraph) -> Vec<NodeInfluence> {
    graph
        .topological_order()
        .into_iter()
        .filter_map(|name| graph.index_of(name).ok().map(|idx| (name, idx)))
        .map(|(name, idx)| {
            let (descendants, weighted_influence) = weighted_influence(graph, idx);
            NodeInfluence {
                node: name.to_string(),
                category: graph.graph[idx].category,
                descendants,
                weighted_influence,
            }
        })
        .collect()
}
