use tb_delay_synthesis::{
    CausalConfig, CausalEdge, CausalGraphEngine, CausalNode, EvidenceStrength, NodeCategory,
    SynthesisError,
};

fn engine() -> CausalGraphEngine {
    CausalGraphEngine::new(CausalConfig::default())
}

#[test]
fn test_default_paths_end_at_outcomes() {
    let engine = engine();
    let graph = engine.default_delay_dag().unwrap();
    let outcomes = graph.outcomes();
    let paths = engine.enumerate_paths(&graph, &outcomes).unwrap();

    assert!(!paths.is_empty());
    for path in &paths {
        assert_eq!(path.nodes.first(), Some(&path.source));
        assert_eq!(path.nodes.last(), Some(&path.outcome));
        assert_eq!(path.strengths.len(), path.nodes.len() - 1);
        assert!((1.0..=3.0).contains(&path.evidence_score));
        assert!(!outcomes.contains(&path.source.as_str()));
    }
    assert!(paths.windows(2).all(|p| p[0].outcome <= p[1].outcome));

    let mediated = engine.enumerate_mediated_paths(&graph, &outcomes).unwrap();
    assert!(mediated.iter().all(|p| p.nodes.len() > 2));
    assert!(mediated.len() < paths.len());
}

#[test]
fn test_default_structure() {
    let engine = engine();
    let graph = engine.default_delay_dag().unwrap();
    let summary = engine.structure_summary(&graph);
    assert_eq!(summary.nodes, 8);
    assert_eq!(summary.edges, 12);
    assert!((summary.density - 12.0 / 56.0).abs() < 1e-12);

    let pn = summary
        .pathways
        .iter()
        .find(|p| p.outcome == "pn_ratio")
        .unwrap();
    assert!(pn.direct_causes.contains(&"in_ratio".to_string()));
    assert!(pn.indirect_causes.contains(&"poverty_pct".to_string()));
}

#[test]
fn test_sinks_have_no_influence() {
    let engine = engine();
    let graph = engine.default_delay_dag().unwrap();
    let influence = engine.influence_scores(&graph);
    assert_eq!(influence.len(), 8);

    let pn = influence.iter().find(|i| i.node == "pn_ratio").unwrap();
    assert_eq!(pn.descendants, 0);
    assert_eq!(pn.weighted_influence, 0.0);

    let poverty = influence.iter().find(|i| i.node == "poverty_pct").unwrap();
    assert!(poverty.weighted_influence > 0.0);
    assert_eq!(poverty.category, NodeCategory::Socioeconomic);
}

#[test]
fn test_custom_model() {
    let nodes = vec![
        CausalNode::new("stigma", NodeCategory::Socioeconomic),
        CausalNode::new("care_seeking", NodeCategory::RiskFactor),
        CausalNode::new("patient_delay", NodeCategory::Outcome),
    ];
    let edges = vec![
        CausalEdge::new("stigma", "care_seeking", EvidenceStrength::Strong),
        CausalEdge::new("care_seeking", "patient_delay", EvidenceStrength::Weak),
        CausalEdge::new("stigma", "patient_delay", EvidenceStrength::Moderate),
    ];
    let engine = engine();
    let graph = engine.build_with_nodes(&nodes, &edges).unwrap();

    let paths = engine.enumerate_paths(&graph, &["patient_delay"]).unwrap();
    assert_eq!(paths.len(), 3);
    // Direct moderate edge (2.0) ties the mediated strong-weak path (2.0); shorter first
    assert_eq!(paths[0].describe(), "stigma -> patient_delay");
    assert_eq!(paths[1].describe(), "stigma -> care_seeking -> patient_delay");
    assert_eq!(paths[1].describe_strengths(), "strong, weak");

    // 3 + 2 + mean(3, 1)
    assert!((engine.influence(&graph, "stigma").unwrap() - 7.0).abs() < 1e-12);
}

#[test]
fn test_cycle_names_a_node() {
    let edges = vec![
        CausalEdge::new("poverty", "crowding", EvidenceStrength::Moderate),
        CausalEdge::new("crowding", "delay", EvidenceStrength::Weak),
        CausalEdge::new("delay", "poverty", EvidenceStrength::Weak),
    ];
    match engine().build(&edges) {
        Err(SynthesisError::CyclicGraph { node }) => {
            assert!(["poverty", "crowding", "delay"].contains(&node.as_str()));
        }
        other => panic!("expected a cycle error, got {other:?}"),
    }
}

#[test]
fn test_node_cap_from_config() {
    let engine = CausalGraphEngine::new(CausalConfig {
        max_nodes: 4,
        ..CausalConfig::default()
    });
    assert!(engine.default_delay_dag().is_err());
}

#[test]
fn test_structure_counts_match_enumerated_paths() {
    let engine = engine();
    let graph = engine.default_delay_dag().unwrap();
    let paths = engine.enumerate_paths(&graph, &graph.outcomes()).unwrap();
    let summary = engine.structure_summary(&graph);

    for pathway in &summary.pathways {
        let enumerated = paths.iter().filter(|p| p.outcome == pathway.outcome).count();
        assert_eq!(pathway.total_pathways, enumerated, "{}", pathway.outcome);
    }
    let total: usize = summary.pathways.iter().map(|p| p.total_pathways).sum();
    assert_eq!(total, paths.len());
}
