use proptest::prelude::*;
use tb_delay_synthesis::algorithm::meta::dersimonian_laird;
use tb_delay_synthesis::models::delay::VarianceSource;
use tb_delay_synthesis::{
    DelayCategory, DelayRecordStore, PoolingConfig, RandomEffectsPooler, RawDelayRecord,
    SynthesisError, VarianceImputation,
};

use crate::utils::{delay_store, observation, total_delay_studies};

#[test]
fn test_reference_total_delay() {
    let pooler = RandomEffectsPooler::new(PoolingConfig::default());
    let estimate = pooler.pool(&total_delay_studies()).unwrap();

    assert_eq!(estimate.category, DelayCategory::Total);
    assert_eq!(estimate.k_studies, 6);
    // Q = 58.83 / 9 on 5 df
    assert!((estimate.q_statistic - 58.833_333 / 9.0).abs() < 1e-4);
    assert!(estimate.heterogeneity_tau_squared > 0.0);
    assert!((estimate.point_estimate - 121.0 / 6.0).abs() < 1e-9);
    assert!(estimate.interval_low < estimate.point_estimate);
    assert!(estimate.interval_high > estimate.point_estimate);
    assert!(estimate.q_p_value.is_some());
}

#[test]
fn test_homogeneous_studies_have_zero_tau() {
    let studies = vec![
        observation(DelayCategory::Patient, 20.0, 5.0, "a"),
        observation(DelayCategory::Patient, 20.5, 5.0, "b"),
        observation(DelayCategory::Patient, 19.5, 5.0, "c"),
    ];
    let estimate = RandomEffectsPooler::default().pool(&studies).unwrap();
    assert_eq!(estimate.heterogeneity_tau_squared, 0.0);
    assert_eq!(estimate.i_squared, 0.0);
}

#[test]
fn test_empty_input_is_insufficient() {
    let result = RandomEffectsPooler::default().pool(&[]);
    assert!(matches!(result, Err(SynthesisError::InsufficientData { .. })));
}

#[test]
fn test_mixed_categories_rejected() {
    let studies = vec![
        observation(DelayCategory::Patient, 20.0, 5.0, "a"),
        observation(DelayCategory::Treatment, 4.0, 1.0, "b"),
    ];
    assert!(matches!(
        RandomEffectsPooler::default().pool(&studies),
        Err(SynthesisError::Validation(_))
    ));
}

#[test]
fn test_pool_store_covers_every_category() {
    let estimates = RandomEffectsPooler::default().pool_store(&delay_store());
    let categories: Vec<DelayCategory> = estimates.iter().map(|e| e.category).collect();
    assert_eq!(categories, DelayCategory::ALL.to_vec());
}

#[test]
fn test_variance_imputation_chain() {
    let policy = VarianceImputation::default();
    let records = vec![
        RawDelayRecord::new(DelayCategory::Patient, 20.0, "se").with_standard_error(2.0),
        RawDelayRecord::new(DelayCategory::Patient, 20.0, "sd").with_sd_and_n(10.0, 25.0),
        RawDelayRecord::new(DelayCategory::Patient, 20.0, "cv"),
        RawDelayRecord::new(DelayCategory::Patient, 0.0, "zero"),
        RawDelayRecord::new(DelayCategory::Patient, -3.0, "negative"),
    ];
    let store = DelayRecordStore::from_raw(&records, &policy).unwrap();
    assert_eq!(store.len(), 4);
    assert_eq!(store.rejected(), 1);

    let sources: Vec<(VarianceSource, f64)> = store
        .observations()
        .iter()
        .map(|o| (o.variance_source, o.variance))
        .collect();
    assert_eq!(sources[0], (VarianceSource::ReportedStandardError, 4.0));
    assert_eq!(sources[1], (VarianceSource::DerivedFromSd, 4.0));
    assert_eq!(sources[2].0, VarianceSource::CoefficientOfVariation);
    assert!((sources[2].1 - 36.0).abs() < 1e-9);
    assert_eq!(sources[3], (VarianceSource::Fallback, 1.0));
}

fn studies() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (1usize..12).prop_flat_map(|k| {
        (
            prop::collection::vec(0.0f64..200.0, k),
            prop::collection::vec(0.1f64..50.0, k),
        )
    })
}

proptest! {
    #[test]
    fn prop_interval_symmetric_and_bounded((effects, variances) in studies()) {
        let stats = dersimonian_laird(&effects, &variances, 1.96);
        let below = stats.pooled - stats.interval_low;
        let above = stats.interval_high - stats.pooled;
        prop_assert!((below - above).abs() < 1e-9 * (1.0 + below.abs()));
        prop_assert!(stats.tau_squared >= 0.0);
        prop_assert!((0.0..=1.0).contains(&stats.i_squared));

        let min = effects.iter().copied().fold(f64::INFINITY, f64::min);
        let max = effects.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(stats.pooled >= min - 1e-9 && stats.pooled <= max + 1e-9);
    }

    #[test]
    fn prop_tau_never_narrows_interval((effects, variances) in studies()) {
        let stats = dersimonian_laird(&effects, &variances, 1.96);
        let fixed_se = (1.0 / variances.iter().map(|v| 1.0 / v).sum::<f64>()).sqrt();
        prop_assert!(stats.standard_error >= fixed_se - 1e-12);
    }
}
