use tb_delay_synthesis::algorithm::proxy::{ConstantFill, Standardizer};
use tb_delay_synthesis::models::panel::fields;
use tb_delay_synthesis::{
    ProxyConfig, ProxyFeature, ProxyFeatureBuilder, StateYearRecord, SynthesisError,
};

use crate::utils::{STATES, panel, panel_row};

fn builder() -> ProxyFeatureBuilder {
    ProxyFeatureBuilder::new(ProxyConfig {
        prevalence_cases: Some(250_000.0),
    })
}

#[test]
fn test_indicators_for_one_state() {
    let features = builder().build(&panel()).unwrap();
    assert_eq!(features.len(), STATES.len());

    let bihar = features.iter().find(|f| f.state == "Bihar").unwrap();
    assert!((bihar.get(ProxyFeature::CrowdingIndex) - 2.0e6 / 3.6e5).abs() < 1e-9);
    assert!((bihar.get(ProxyFeature::InRatio) - 2407.0 / 2350.0).abs() < 1e-9);
    assert!((bihar.get(ProxyFeature::LiteracyPct) - 69.3).abs() < 1e-9);
    assert!((bihar.get(ProxyFeature::PovertyPct) - 62.2).abs() < 1e-9);
    assert!((bihar.get(ProxyFeature::SymptomaticNoCarePct) - 51.5).abs() < 1e-9);
    assert!(!bihar.imputed.iter().any(|&i| i));

    // Prevalence apportioned by population share: 2e6 of 36e6
    let total_population: f64 = (0..8).map(|i| 1.0e6 * (1.0 + f64::from(i))).sum();
    let expected = 250_000.0 * 2.0e6 / total_population / 2350.0;
    assert!((bihar.get(ProxyFeature::PnRatio) - expected).abs() < 1e-9);
}

#[test]
fn test_states_sorted_and_years_averaged() {
    let mut rows = panel();
    rows.push(
        panel_row("Kerala", 3.0)
            .with(fields::LITERACY_PCT, 90.0),
    );
    let features = builder().build(&rows).unwrap();

    let names: Vec<&str> = features.iter().map(|f| f.state.as_str()).collect();
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted);

    let kerala = features.iter().find(|f| f.state == "Kerala").unwrap();
    assert_eq!(kerala.years, 2);
    let first_literacy = 60.0 + 3.0 * ((3.0 * 3.1) % 8.0);
    assert!((kerala.get(ProxyFeature::LiteracyPct) - (first_literacy + 90.0) / 2.0).abs() < 1e-9);
}

#[test]
fn test_missing_values_imputed_and_flagged() {
    let mut rows = panel();
    rows[0] = StateYearRecord::new(STATES[0], Some(2024))
        .with(fields::POPULATION, 1.0e6)
        .with(fields::HOUSEHOLDS, 2.0e5);
    let features = builder().build(&rows).unwrap();

    let sparse = &features[0];
    assert!(sparse.was_imputed(ProxyFeature::LiteracyPct));
    assert!(!sparse.was_imputed(ProxyFeature::CrowdingIndex));

    let others: Vec<f64> = features[1..]
        .iter()
        .map(|f| f.get(ProxyFeature::LiteracyPct))
        .collect();
    let mean = others.iter().sum::<f64>() / others.len() as f64;
    assert!((sparse.get(ProxyFeature::LiteracyPct) - mean).abs() < 1e-9);
}

#[test]
fn test_without_prevalence_ratio_is_imputed() {
    let features = ProxyFeatureBuilder::new(ProxyConfig::default())
        .build(&panel())
        .unwrap();
    assert!(features.iter().all(|f| f.was_imputed(ProxyFeature::PnRatio)));
    assert!(features.iter().all(|f| f.get(ProxyFeature::PnRatio) == 0.0));
}

#[test]
fn test_substitute_policy() {
    let rows = vec![
        StateYearRecord::new("A", None)
            .with(fields::POPULATION, 10.0)
            .with(fields::HOUSEHOLDS, 2.0),
        StateYearRecord::new("B", None)
            .with(fields::POPULATION, 30.0)
            .with(fields::HOUSEHOLDS, 5.0),
    ];
    let features = builder()
        .with_policy(Box::new(ConstantFill(-1.0)))
        .build(&rows)
        .unwrap();
    assert_eq!(features[0].get(ProxyFeature::LiteracyPct), -1.0);
    assert_eq!(features[1].get(ProxyFeature::CrowdingIndex), 6.0);
}

#[test]
fn test_missing_required_field() {
    let rows: Vec<StateYearRecord> = STATES
        .iter()
        .map(|s| StateYearRecord::new(*s, None).with(fields::POPULATION, 1.0e6))
        .collect();
    match builder().build(&rows) {
        Err(SynthesisError::MissingFeature { field }) => assert_eq!(field, fields::HOUSEHOLDS),
        other => panic!("expected MissingFeature, got {other:?}"),
    }
}

#[test]
fn test_empty_panel() {
    let err = builder().build(&[]).unwrap_err();
    assert!(matches!(err, SynthesisError::InsufficientData { .. }));
    assert!(err.is_recoverable());
}

#[test]
fn test_standardized_features() {
    let features = builder().build(&panel()).unwrap();
    let rows: Vec<Vec<f64>> = features.iter().map(|f| f.values.to_vec()).collect();
    let (_, standardized) = Standardizer::fit_transform(&rows).unwrap();
    for col in 0..8 {
        let mean: f64 = standardized.iter().map(|r| r[col]).sum::<f64>() / rows.len() as f64;
        assert!(mean.abs() < 1e-9);
    }
}
