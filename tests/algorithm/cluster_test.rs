use proptest::prelude::*;
use tb_delay_synthesis::algorithm::cluster::cluster_profiles;
use tb_delay_synthesis::{
    ClusterAssigner, ClusterConfig, ClusterLabel, ProxyFeature, ProxyFeatureVector, SynthesisError,
};

use crate::utils::feature_vector;

/// Two well separated groups of three states
fn two_groups() -> Vec<ProxyFeatureVector> {
    let low = [0.5, 1.0, 20.0, 30.0, 70.0, 4.0, 85.0, 20.0];
    let high = [3.0, 1.4, 60.0, 70.0, 40.0, 6.0, 55.0, 70.0];
    let jitter = |base: [f64; 8], j: f64| base.map(|v| v * (1.0 + 0.01 * j));
    vec![
        feature_vector("A", jitter(low, 0.0)),
        feature_vector("B", jitter(high, 0.0)),
        feature_vector("C", jitter(low, 1.0)),
        feature_vector("D", jitter(high, 1.0)),
        feature_vector("E", jitter(low, -1.0)),
        feature_vector("F", jitter(high, -1.0)),
    ]
}

#[test]
fn test_separated_groups_recovered() {
    let assigner = ClusterAssigner::new(ClusterConfig::default().with_k(2));
    let assignment = assigner.assign_default(&two_groups()).unwrap();

    assert_eq!(assignment.k, 2);
    let a = assignment.label_of("A").unwrap();
    let b = assignment.label_of("B").unwrap();
    assert_ne!(a, b);
    assert_eq!(assignment.label_of("C"), Some(a));
    assert_eq!(assignment.label_of("E"), Some(a));
    assert_eq!(assignment.label_of("D"), Some(b));
    assert_eq!(assignment.label_of("F"), Some(b));
    // Labels are numbered by first appearance
    assert_eq!(a, ClusterLabel::Cluster(0));
}

#[test]
fn test_seeded_runs_are_identical() {
    let assigner = ClusterAssigner::new(ClusterConfig::default().with_k(3).with_seed(7));
    let first = assigner.assign_default(&two_groups()).unwrap();
    let second = assigner.assign_default(&two_groups()).unwrap();
    assert_eq!(first.labels, second.labels);
    assert_eq!(first.inertia, second.inertia);
}

#[test]
fn test_k_clamped_to_states() {
    let features = two_groups();
    let assignment = ClusterAssigner::default()
        .assign(&features[..3], 4)
        .unwrap();
    assert!(assignment.k <= 3);
    assert_eq!(assignment.labels.len(), 3);
}

#[test]
fn test_single_state_single_cluster() {
    let features = two_groups();
    let assignment = ClusterAssigner::default().assign(&features[..1], 4).unwrap();
    assert_eq!(assignment.labels, vec![ClusterLabel::Cluster(0)]);
}

#[test]
fn test_entirely_imputed_input() {
    let mut features = two_groups();
    for f in &mut features {
        f.imputed = [true; 8];
    }
    let assignment = ClusterAssigner::default().assign_default(&features).unwrap();
    assert!(assignment
        .labels
        .iter()
        .all(|l| *l == ClusterLabel::InsufficientData));
}

#[test]
fn test_invalid_requests() {
    let assigner = ClusterAssigner::default();
    assert!(matches!(
        assigner.assign(&two_groups(), 0),
        Err(SynthesisError::Validation(_))
    ));
    assert!(matches!(
        assigner.assign(&[], 2),
        Err(SynthesisError::InsufficientData { .. })
    ));
}

#[test]
fn test_profiles_average_each_group() {
    let features = two_groups();
    let assignment = ClusterAssigner::new(ClusterConfig::default().with_k(2))
        .assign_default(&features)
        .unwrap();
    let profiles = cluster_profiles(&assignment, &features);

    assert_eq!(profiles.len(), 2);
    let low = profiles
        .iter()
        .find(|p| p.states.contains(&"A".to_string()))
        .unwrap();
    assert_eq!(low.size(), 3);
    assert_eq!(low.states, vec!["A", "C", "E"]);
    assert!((low.mean(ProxyFeature::PovertyPct) - 20.0).abs() < 1e-9);
}

#[test]
fn test_k_one_gives_every_state_one_label() {
    let assignment = ClusterAssigner::default().assign(&two_groups(), 1).unwrap();
    assert_eq!(assignment.k, 1);
    assert_eq!(assignment.distinct_labels(), 1);
    assert!(assignment
        .labels
        .iter()
        .all(|l| *l == ClusterLabel::Cluster(0)));
}

/// States cycling over a few distinct feature rows, plus a requested k
fn duplicated_rows() -> impl Strategy<Value = (Vec<ProxyFeatureVector>, usize)> {
    (
        prop::collection::vec(prop::array::uniform8(-50.0f64..50.0), 1..5),
        2usize..10,
    )
        .prop_flat_map(|(rows, n_states)| {
            let features: Vec<ProxyFeatureVector> = (0..n_states)
                .map(|i| feature_vector(&format!("S{i}"), rows[i % rows.len()]))
                .collect();
            (Just(features), 1..=n_states)
        })
}

proptest! {
    #[test]
    fn prop_assigns_exactly_k_labels((features, k) in duplicated_rows()) {
        let assignment = ClusterAssigner::default().assign(&features, k).unwrap();
        prop_assert_eq!(assignment.k, k);
        prop_assert_eq!(assignment.distinct_labels(), k);
        prop_assert_eq!(assignment.labels.len(), features.len());
    }
}
