use tb_delay_synthesis::algorithm::integration::composite_score;
use tb_delay_synthesis::{
    CategoryEstimate, CausalConfig, CausalGraphEngine, ClusterAssigner, ClusterConfig,
    ComponentReducer, DelayCategory, EstimateSource, EvidenceIntegrator, PcaConfig, ProxyConfig,
    ProxyFeature, ProxyFeatureBuilder, RandomEffectsPooler, ScoreWeights,
};

use crate::utils::{STATES, delay_store, panel};

fn classical_estimates(source: &EstimateSource) -> Vec<CategoryEstimate> {
    RandomEffectsPooler::default()
        .pool_store(&delay_store())
        .into_iter()
        .map(|classical| CategoryEstimate {
            category: classical.category,
            classical,
            bayesian: None,
            source: source.clone(),
        })
        .collect()
}

#[test]
fn test_every_method_feeds_the_ranking() {
    let features = ProxyFeatureBuilder::new(ProxyConfig {
        prevalence_cases: Some(250_000.0),
    })
    .build(&panel())
    .unwrap();
    let clusters = ClusterAssigner::new(ClusterConfig::default())
        .assign_default(&features)
        .unwrap();
    let components = ComponentReducer::new(PcaConfig::default()).reduce(&features).unwrap();
    let engine = CausalGraphEngine::default();
    let graph = engine.default_delay_dag().unwrap();
    let influence = engine.influence_scores(&graph);
    let pooled = classical_estimates(&EstimateSource::Classical);

    let integrator = EvidenceIntegrator::default();
    let scores = integrator
        .integrate(&pooled, Some(&clusters), Some(&components), &influence, &features)
        .unwrap();

    assert_eq!(scores.len(), STATES.len());
    let ranks: Vec<usize> = scores.iter().map(|s| s.priority_rank).collect();
    assert_eq!(ranks, (1..=STATES.len()).collect::<Vec<_>>());
    assert!(scores
        .windows(2)
        .all(|p| p[0].composite_score >= p[1].composite_score));

    let total = pooled
        .iter()
        .find(|e| e.category == DelayCategory::Total)
        .map(CategoryEstimate::value);
    for score in &scores {
        let feature = features.iter().find(|f| f.state == score.state).unwrap();
        let expected = composite_score(
            integrator.weights(),
            feature.get(ProxyFeature::PnRatio),
            feature.get(ProxyFeature::PovertyPct),
            feature.get(ProxyFeature::SymptomaticNoCarePct),
        );
        assert!((score.composite_score - expected).abs() < 1e-12);
        assert!(score.cluster.is_some());
        assert!(score.pc1.is_some() && score.pc2.is_some());
        assert!(score.poverty_influence.is_some_and(|v| v > 0.0));
        assert_eq!(score.ratio_influence, Some(0.0));
        assert_eq!(score.pooled_total_delay, total);
        assert_eq!(score.weights_version, "v1");
    }
}

#[test]
fn test_optional_inputs_left_empty() {
    let features = ProxyFeatureBuilder::new(ProxyConfig::default())
        .build(&panel())
        .unwrap();
    let scores = EvidenceIntegrator::default()
        .integrate(&[], None, None, &[], &features)
        .unwrap();
    assert!(scores.iter().all(|s| s.cluster.is_none()
        && s.pc1.is_none()
        && s.ratio_influence.is_none()
        && s.pooled_total_delay.is_none()));
}

#[test]
fn test_custom_weights_are_versioned() {
    let features = ProxyFeatureBuilder::new(ProxyConfig::default())
        .build(&panel())
        .unwrap();
    let weights = ScoreWeights {
        version: "poverty-only".to_string(),
        ratio: 0.0,
        poverty: 1.0,
        symptomatic: 0.0,
    };
    let scores = EvidenceIntegrator::new(weights, CausalConfig::default())
        .integrate(&[], None, None, &[], &features)
        .unwrap();

    let top = &scores[0];
    let max_poverty = features
        .iter()
        .map(|f| f.get(ProxyFeature::PovertyPct))
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(top.composite_score, max_poverty);
    assert!(scores.iter().all(|s| s.weights_version == "poverty-only"));
}

#[test]
fn test_method_summary_labels_fallbacks() {
    let integrator = EvidenceIntegrator::default();
    let fallback = EstimateSource::ClassicalFallback {
        reason: "R-hat 1.4".to_string(),
    };
    let rows = integrator.method_summary(&classical_estimates(&fallback), None, None);
    assert_eq!(rows.len(), 4);
    assert!(rows
        .iter()
        .all(|r| r.method == "DerSimonian-Laird (Bayesian fallback)"
            && r.confidence == "95% CI, lower confidence"));

    let graph = CausalGraphEngine::default().default_delay_dag().unwrap();
    let structure = CausalGraphEngine::default().structure_summary(&graph);
    let rows = integrator.method_summary(
        &classical_estimates(&EstimateSource::Classical),
        None,
        Some(&structure),
    );
    assert_eq!(rows[0].method, "DerSimonian-Laird");
    assert_eq!(rows[0].metric, "Patient delay (days)");
    let dag = rows.last().unwrap();
    assert_eq!(dag.metric, "Network density");
    assert_eq!(dag.n, 8);
}
