use tb_delay_synthesis::models::panel::fields;
use tb_delay_synthesis::{
    BayesianConfig, CausalEdge, CausalNode, DelayRecordStore, EstimateSource, EvidenceStrength,
    NodeCategory, RegressionConfig, StateYearRecord, SynthesisConfig, SynthesisError,
    SynthesisPipeline,
};

use crate::utils::{STATES, delay_store, fast_config, offline_backend, panel, stuck_backend};

#[test]
fn test_run_without_backend() {
    let report = SynthesisPipeline::new(fast_config())
        .without_backend()
        .run(&delay_store(), &panel())
        .unwrap();

    assert_eq!(report.estimates.len(), 4);
    assert!(report
        .estimates
        .iter()
        .all(|e| e.source == EstimateSource::Classical && e.bayesian.is_none()));
    assert_eq!(report.warnings_for("bayesian").count(), 4);
    assert_eq!(report.lower_confidence_estimates().count(), 0);

    assert_eq!(report.features.len(), STATES.len());
    assert_eq!(report.scores.len(), STATES.len());
    assert!(report.clusters.is_some());
    assert!(!report.cluster_profiles.is_empty());
    assert!(report.pca.is_some());
    assert_eq!(report.structure.nodes, 8);
    assert!(!report.paths.is_empty());
    assert_eq!(report.panel_schema_version, "2025.1");
    assert_eq!(report.score_of("Bihar").map(|s| s.state.as_str()), Some("Bihar"));
    assert!(report.regression.is_none());
    assert_eq!(report.warnings_for("regression").count(), 1);
}

#[test]
fn test_non_convergence_falls_back_to_classical() {
    let report = SynthesisPipeline::new(fast_config())
        .with_backend(stuck_backend())
        .run(&delay_store(), &panel())
        .unwrap();

    assert_eq!(report.lower_confidence_estimates().count(), 4);
    for estimate in &report.estimates {
        assert!(matches!(estimate.source, EstimateSource::ClassicalFallback { .. }));
        assert_eq!(estimate.value(), estimate.classical.point_estimate);
    }
    let fallback_rows = report
        .method_summary
        .iter()
        .filter(|r| r.method == "DerSimonian-Laird (Bayesian fallback)")
        .count();
    assert_eq!(fallback_rows, 4);
    assert!(report
        .warnings_for("bayesian")
        .all(|w| w.message.contains("lower confidence")));
    assert!(report.regression.is_none());
    assert!(report
        .warnings_for("regression")
        .any(|w| w.message.contains("cannot sample the state regression")));
}

#[test]
fn test_unavailable_backend_warns() {
    let report = SynthesisPipeline::new(fast_config())
        .with_backend(offline_backend())
        .run(&delay_store(), &panel())
        .unwrap();
    assert!(report
        .estimates
        .iter()
        .all(|e| e.source == EstimateSource::Classical));
    assert!(report
        .warnings_for("bayesian")
        .all(|w| w.message.contains("offline")));
}

#[test]
fn test_disabled_bayesian_stays_quiet() {
    let mut bayesian = BayesianConfig::default();
    bayesian.enabled = false;
    let config = fast_config().with_bayesian(bayesian);
    let report = SynthesisPipeline::new(config)
        .run(&delay_store(), &panel())
        .unwrap();
    assert_eq!(report.warnings_for("bayesian").count(), 0);
}

#[test]
fn test_disabled_regression_stays_quiet() {
    let mut regression = RegressionConfig::default();
    regression.enabled = false;
    let report = SynthesisPipeline::new(fast_config().with_regression(regression))
        .without_backend()
        .run(&delay_store(), &panel())
        .unwrap();
    assert!(report.regression.is_none());
    assert_eq!(report.warnings_for("regression").count(), 0);
}

#[cfg(feature = "nuts")]
#[test]
fn test_seeded_runs_rank_identically() {
    let pipeline = SynthesisPipeline::new(fast_config());
    let first = pipeline.run(&delay_store(), &panel()).unwrap();
    let second = pipeline.run(&delay_store(), &panel()).unwrap();
    assert_eq!(first.estimates, second.estimates);
    assert_eq!(first.scores, second.scores);
    assert_eq!(first.regression, second.regression);
    let regression = first.regression.as_ref().unwrap();
    assert_eq!(regression.n_states, STATES.len());
    assert_eq!(regression.coefficients.len(), 9);
    for estimate in &first.estimates {
        assert!(matches!(
            estimate.source,
            EstimateSource::Bayesian | EstimateSource::ClassicalFallback { .. }
        ));
    }
}

#[test]
fn test_missing_prevalence_warns() {
    let config = fast_config().with_prevalence_cases(None);
    let report = SynthesisPipeline::new(config)
        .without_backend()
        .run(&delay_store(), &panel())
        .unwrap();
    assert!(report
        .warnings_for("proxy")
        .any(|w| w.message.contains("pn_ratio")));
}

#[test]
fn test_cyclic_custom_model_aborts() {
    let nodes = vec![
        CausalNode::new("a", NodeCategory::Socioeconomic),
        CausalNode::new("b", NodeCategory::Outcome),
    ];
    let edges = vec![
        CausalEdge::new("a", "b", EvidenceStrength::Strong),
        CausalEdge::new("b", "a", EvidenceStrength::Weak),
    ];
    let result = SynthesisPipeline::new(fast_config())
        .without_backend()
        .with_causal_model(nodes, edges)
        .run(&delay_store(), &panel());
    assert!(matches!(result, Err(SynthesisError::CyclicGraph { .. })));
}

#[test]
fn test_missing_required_field_aborts() {
    let panel: Vec<StateYearRecord> = STATES
        .iter()
        .map(|s| StateYearRecord::new(*s, Some(2024)).with(fields::POPULATION, 1.0e6))
        .collect();
    let result = SynthesisPipeline::new(fast_config())
        .without_backend()
        .run(&delay_store(), &panel);
    assert!(matches!(result, Err(SynthesisError::MissingFeature { .. })));
}

#[test]
fn test_empty_inputs_degrade_gracefully() {
    let report = SynthesisPipeline::new(SynthesisConfig::default())
        .without_backend()
        .run(&DelayRecordStore::new(), &[])
        .unwrap();
    assert!(report.estimates.is_empty());
    assert!(report.features.is_empty());
    assert!(report.scores.is_empty());
    assert!(report.clusters.is_none());
    assert!(report.pca.is_none());
    assert!(report.warnings_for("pooling").count() > 0);
    assert!(report.warnings_for("proxy").count() > 0);
}
