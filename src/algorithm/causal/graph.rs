//! Evidence-typed causal DAG
//!
//! Construction is all-or-nothing: an edge set containing a cycle is
//! rejected, never pruned into a DAG.

use std::fmt;
use std::str::FromStr;

use log::debug;
use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthesisError};

/// Strength of the evidence behind a causal edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceStrength {
    Strong,
    Moderate,
    Weak,
}

impl EvidenceStrength {
    /// Numeric weight: strong 3, moderate 2, weak 1
    #[must_use]
    pub const fn weight(self) -> f64 {
        match self {
            Self::Strong => 3.0,
            Self::Moderate => 2.0,
            Self::Weak => 1.0,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Moderate => "moderate",
            Self::Weak => "weak",
        }
    }
}

impl fmt::Display for EvidenceStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvidenceStrength {
    type Err = SynthesisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "strong" => Ok(Self::Strong),
            "moderate" => Ok(Self::Moderate),
            "weak" => Ok(Self::Weak),
            other => Err(SynthesisError::Validation(format!(
                "Unknown evidence strength '{other}'"
            ))),
        }
    }
}

/// Role of a variable in the delay model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    Socioeconomic,
    RiskFactor,
    SystemFactor,
    Outcome,
    #[default]
    Unspecified,
}

impl NodeCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Socioeconomic => "socioeconomic",
            Self::RiskFactor => "risk_factor",
            Self::SystemFactor => "system_factor",
            Self::Outcome => "outcome",
            Self::Unspecified => "unspecified",
        }
    }
}

/// A named variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausalNode {
    pub name: String,
    pub category: NodeCategory,
}

impl CausalNode {
    #[must_use]
    pub fn new(name: impl Into<String>, category: NodeCategory) -> Self {
        Self {
            name: name.into(),
            category,
        }
    }
}

/// A directed, evidence-typed relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausalEdge {
    pub source: String,
    pub target: String,
    pub strength: EvidenceStrength,
}

impl CausalEdge {
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>, strength: EvidenceStrength) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            strength,
        }
    }
}

/// Validated directed acyclic graph of causal assumptions
#[derive(Debug, Clone)]
pub struct CausalGraph {
    pub(crate) graph: DiGraph<CausalNode, EvidenceStrength>,
    index: FxHashMap<String, NodeIndex>,
    order: Vec<NodeIndex>,
}

impl CausalGraph {
    /// Build from edges alone; every node gets [`NodeCategory::Unspecified`]
    pub fn build(edges: &[CausalEdge], max_nodes: usize) -> Result<Self> {
        Self::build_with_nodes(&[], edges, max_nodes)
    }

    /// Build from declared nodes plus edges
    ///
    /// Nodes referenced only by edges are added as unspecified.
    ///
    /// # Errors
    /// * `CyclicGraph` if the edges contain a cycle (including self-loops)
    /// * `Validation` for duplicate nodes or edges or too many nodes
    pub fn build_with_nodes(
        nodes: &[CausalNode],
        edges: &[CausalEdge],
        max_nodes: usize,
    ) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut index = FxHashMap::default();

        for node in nodes {
            if index.contains_key(&node.name) {
                return Err(SynthesisError::Validation(format!(
                    "Causal node '{}' declared twice",
                    node.name
                )));
            }
            let idx = graph.add_node(node.clone());
            index.insert(node.name.clone(), idx);
        }

        let mut intern = |graph: &mut DiGraph<CausalNode, EvidenceStrength>, name: &str| {
            *index
                .entry(name.to_string())
                .or_insert_with(|| graph.add_node(CausalNode::new(name, NodeCategory::Unspecified)))
        };
        for edge in edges {
            let source = intern(&mut graph, &edge.source);
            let target = intern(&mut graph, &edge.target);
            if graph.find_edge(source, target).is_some() {
                return Err(SynthesisError::Validation(format!(
                    "Duplicate causal edge {} -> {}",
                    edge.source, edge.target
                )));
            }
            graph.add_edge(source, target, edge.strength);
        }

        if graph.node_count() > max_nodes {
            return Err(SynthesisError::Validation(format!(
                "Causal graph has {} nodes; path enumeration is limited to {max_nodes}",
                graph.node_count()
            )));
        }

        let order = toposort(&graph, None).map_err(|cycle| SynthesisError::CyclicGraph {
            node: graph[cycle.node_id()].name.clone(),
        })?;

        debug!(
            "Built causal DAG with {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(Self { graph, index, order })
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub(crate) fn index_of(&self, name: &str) -> Result<NodeIndex> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| SynthesisError::Validation(format!("Unknown causal node '{name}'")))
    }

    pub(crate) fn name(&self, idx: NodeIndex) -> &str {
        &self.graph[idx].name
    }

    /// Category of a node, if present
    #[must_use]
    pub fn category(&self, name: &str) -> Option<NodeCategory> {
        self.index.get(name).map(|&idx| self.graph[idx].category)
    }

    /// Node names in a topological order
    #[must_use]
    pub fn topological_order(&self) -> Vec<&str> {
        self.order.iter().map(|&idx| self.name(idx)).collect()
    }

    /// Nodes categorized as outcomes, in topological order
    #[must_use]
    pub fn outcomes(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|&&idx| self.graph[idx].category == NodeCategory::Outcome)
            .map(|&idx| self.name(idx))
            .collect()
    }

    /// Evidence strength of the edge `source -> target`, if present
    #[must_use]
    pub fn strength(&self, source: &str, target: &str) -> Option<EvidenceStrength> {
        let a = *self.index.get(source)?;
        let b = *self.index.get(target)?;
        self.graph.find_edge(a, b).map(|e| self.graph[e])
    }

    /// Edges as plain records, in insertion order
    #[must_use]
    pub fn edges(&self) -> Vec<CausalEdge> {
        self.graph
            .edge_references()
            .map(|e| CausalEdge::new(self.name(e.source()), self.name(e.target()), *e.weight()))
            .collect()
    }

    /// Direct causes of a node
    pub fn parents(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.index_of(name)?;
        let mut parents: Vec<&str> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|p| self.name(p))
            .collect();
        parents.sort_unstable();
        Ok(parents)
    }

    pub(crate) fn descendant_indices(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut dfs = Dfs::new(&self.graph, idx);
        let mut found = Vec::new();
        while let Some(node) = dfs.next(&self.graph) {
            if node != idx {
                found.push(node);
            }
        }
        found
    }

    /// Every node reachable from `name`, sorted by name
    pub fn descendants(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.index_of(name)?;
        let mut names: Vec<&str> = self
            .descendant_indices(idx)
            .into_iter()
            .map(|d| self.name(d))
            .collect();
        names.sort_unstable();
        Ok(names)
    }

    /// Every node from which `name` is reachable, sorted by name
    pub fn ancestors(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.index_of(name)?;
        let mut names: Vec<&str> = self
            .graph
            .node_indices()
            .filter(|&n| n != idx && petgraph::algo::has_path_connecting(&self.graph, n, idx, None))
            .map(|n| self.name(n))
            .collect();
        names.sort_unstable();
        Ok(names)
    }
}
