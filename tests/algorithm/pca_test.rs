use proptest::prelude::*;
use tb_delay_synthesis::models::feature::feature_rows;
use tb_delay_synthesis::{
    ComponentReducer, PcaConfig, ProxyConfig, ProxyFeatureBuilder, ProxyFeatureVector,
    SynthesisError,
};

use crate::utils::{feature_vector, panel};

#[test]
fn test_panel_decomposition() {
    let features = ProxyFeatureBuilder::new(ProxyConfig {
        prevalence_cases: Some(250_000.0),
    })
    .build(&panel())
    .unwrap();
    let result = ComponentReducer::new(PcaConfig::default()).reduce(&features).unwrap();

    assert_eq!(result.n_components(), 8);
    assert_eq!(result.states.len(), features.len());
    assert!(result
        .eigenvalues
        .windows(2)
        .all(|pair| pair[0] >= pair[1]));
    assert!((result.cumulative_variance.last().unwrap() - 1.0).abs() < 1e-9);

    // Scaled with ddof 0, covariance with ddof 1
    let n = features.len() as f64;
    let total: f64 = result.eigenvalues.iter().sum();
    assert!((total - 8.0 * n / (n - 1.0)).abs() < 1e-6);

    let interpretations = result.interpret(3, 3);
    assert_eq!(interpretations.len(), 3);
    assert!(interpretations[0].description.starts_with("PC1 ("));
    assert_eq!(interpretations[0].top_features.len(), 3);

    assert_eq!(result.component_scores().len(), features.len() * 8);
    assert_eq!(result.component_loadings().len(), 64);
    assert!(result.score(&features[0].state, 1).is_some());
    assert!(result.score(&features[0].state, 0).is_none());
}

#[test]
fn test_loadings_are_orthonormal() {
    let features = vec![
        feature_vector("A", [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]),
        feature_vector("B", [2.0, 1.0, 5.0, 3.0, 6.0, 4.0, 9.0, 7.0]),
        feature_vector("C", [0.0, 3.0, 2.0, 6.0, 4.0, 8.0, 6.0, 9.0]),
        feature_vector("D", [3.0, 0.5, 4.0, 2.0, 7.0, 5.0, 8.0, 6.0]),
    ];
    let result = ComponentReducer::default().reduce(&features).unwrap();
    for (i, a) in result.loadings.iter().enumerate() {
        for (j, b) in result.loadings.iter().enumerate() {
            let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!((dot - expected).abs() < 1e-8, "loadings {i} and {j}: {dot}");
        }
    }
}

#[test]
fn test_single_state_is_insufficient() {
    let features = vec![feature_vector("A", [1.0; 8])];
    let err = ComponentReducer::default().reduce(&features).unwrap_err();
    assert!(matches!(err, SynthesisError::InsufficientData { .. }));
}

fn feature_table() -> impl Strategy<Value = Vec<ProxyFeatureVector>> {
    prop::collection::vec(prop::array::uniform8(0.0f64..100.0), 3..12).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, values)| feature_vector(&format!("S{i:02}"), values))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_cumulative_variance_monotone(features in feature_table()) {
        if let Ok(result) = ComponentReducer::default().reduce(&features) {
            prop_assert!(result.cumulative_variance.windows(2).all(|p| p[1] >= p[0] - 1e-12));
            let last = *result.cumulative_variance.last().unwrap();
            prop_assert!((last - 1.0).abs() < 1e-9);
            prop_assert!(result.explained_variance_ratio.iter().all(|r| *r >= 0.0));
        }
    }

    #[test]
    fn prop_full_rank_round_trip(features in feature_table()) {
        if let Ok(result) = ComponentReducer::default().reduce(&features) {
            let standardized = result.scaler.transform(&feature_rows(&features));
            let restored = result.inverse_transform(&result.scores);
            for (row, back) in standardized.iter().zip(&restored) {
                for (x, y) in row.iter().zip(back) {
                    prop_assert!((x - y).abs() < 1e-6);
                }
            }
        }
    }
}
