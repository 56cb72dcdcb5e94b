use std::sync::Arc;

use tb_delay_synthesis::algorithm::meta::bayesian::model::HierarchicalModel;
use tb_delay_synthesis::algorithm::meta::bayesian::{ChainTrace, SamplingRequest};
use tb_delay_synthesis::models::panel::fields;
use tb_delay_synthesis::{
    BayesianBackend, BayesianConfig, DelayCategory, DelayObservation, DelayRecordStore,
    ProxyFeatureVector, RawDelayRecord, RegressionConfig, Result, StateYearRecord,
    SynthesisConfig, VarianceImputation,
};

/// States of the synthetic panel
pub const STATES: [&str; 8] = [
    "Andhra Pradesh",
    "Bihar",
    "Gujarat",
    "Kerala",
    "Maharashtra",
    "Odisha",
    "Rajasthan",
    "Uttar Pradesh",
];

/// Observation with a known variance
#[must_use]
pub fn observation(category: DelayCategory, effect: f64, se: f64, id: &str) -> DelayObservation {
    DelayObservation::new(category, effect, se * se, id).unwrap()
}

/// Six total-delay studies with SE 3
#[must_use]
pub fn total_delay_studies() -> Vec<DelayObservation> {
    [18.0, 22.0, 20.0, 25.0, 15.0, 21.0]
        .iter()
        .enumerate()
        .map(|(i, &effect)| observation(DelayCategory::Total, effect, 3.0, &format!("pmid-{i}")))
        .collect()
}

/// Raw records covering every category, some without a reported SE
#[must_use]
pub fn raw_records() -> Vec<RawDelayRecord> {
    let mut records = Vec::new();
    let rows: [(DelayCategory, &[f64]); 4] = [
        (DelayCategory::Patient, &[24.0, 31.0, 18.0, 27.0]),
        (DelayCategory::Diagnostic, &[12.0, 19.0, 9.0]),
        (DelayCategory::Treatment, &[4.0, 6.5, 3.0]),
        (DelayCategory::Total, &[45.0, 58.0, 39.0, 61.0, 50.0]),
    ];
    for (category, effects) in rows {
        for (i, &effect) in effects.iter().enumerate() {
            let record = RawDelayRecord::new(category, effect, format!("{category}-{i}"));
            let record = match i % 3 {
                0 => record.with_standard_error(effect * 0.15),
                1 => record.with_sd_and_n(effect * 0.8, 60.0),
                _ => record,
            };
            records.push(record);
        }
    }
    records
}

#[must_use]
pub fn delay_store() -> DelayRecordStore {
    DelayRecordStore::from_raw(&raw_records(), &VarianceImputation::default()).unwrap()
}

/// One census-style row with every field the proxy builder reads
#[must_use]
pub fn panel_row(state: &str, i: f64) -> StateYearRecord {
    StateYearRecord::new(state, Some(2024))
        .with(fields::POPULATION, 1_000_000.0 * (1.0 + i))
        .with(fields::HOUSEHOLDS, 200_000.0 * (1.0 + 0.8 * i))
        .with(fields::NOTIFIED_2024, 2_000.0 + 350.0 * i * i)
        .with(fields::NOTIFIED_2023, 1_900.0 + 300.0 * i)
        .with(fields::TB_DEATHS, 50.0 + 7.0 * i)
        .with(fields::TREATED_SUCCESSFULLY_2023, 1_500.0 + 250.0 * i)
        .with(fields::IMPROVED_SANITATION_PCT, 40.0 + 5.0 * ((i * 1.7) % 7.0))
        .with(fields::ASSET_HOUSEHOLDS, 50_000.0 + 9_000.0 * ((i * 2.3) % 5.0))
        .with(fields::LITERACY_PCT, 60.0 + 3.0 * ((i * 3.1) % 8.0))
        .with(fields::CLEAN_FUEL_PCT, 30.0 + 6.0 * ((i * 1.3) % 9.0))
}

/// One row per state in [`STATES`]
#[must_use]
pub fn panel() -> Vec<StateYearRecord> {
    STATES
        .iter()
        .enumerate()
        .map(|(i, state)| panel_row(state, i as f64))
        .collect()
}

/// Feature vector with nothing imputed
#[must_use]
pub fn feature_vector(state: &str, values: [f64; 8]) -> ProxyFeatureVector {
    ProxyFeatureVector {
        state: state.to_string(),
        values,
        imputed: [false; 8],
        years: 1,
    }
}

/// Configuration with a small, fast sampling budget
#[must_use]
pub fn fast_config() -> SynthesisConfig {
    SynthesisConfig::default()
        .with_bayesian(
            BayesianConfig::default()
                .with_budget(2, 200, 200)
                .with_convergence_limits(1.1, 50.0),
        )
        .with_regression(RegressionConfig::default().with_budget(2, 200, 200))
        .with_prevalence_cases(Some(250_000.0))
}

/// Backend whose chains never mix
pub struct StuckBackend;

impl BayesianBackend for StuckBackend {
    fn name(&self) -> &str {
        "stuck"
    }

    fn sample(
        &self,
        _category: DelayCategory,
        _model: &HierarchicalModel,
        request: &SamplingRequest,
    ) -> Result<Vec<ChainTrace>> {
        Ok((0..request.chains)
            .map(|chain| {
                let offset = 10.0 * chain as f64;
                ChainTrace {
                    mu: (0..request.draws)
                        .map(|i| offset + 0.1 * (i % 7) as f64)
                        .collect(),
                    tau: (0..request.draws)
                        .map(|i| 1.0 + offset + 0.05 * (i % 5) as f64)
                        .collect(),
                    divergences: 0,
                    mean_accept_stat: 0.9,
                    step_size: 0.1,
                }
            })
            .collect())
    }
}

/// Backend that reports itself unreachable
pub struct OfflineBackend;

impl BayesianBackend for OfflineBackend {
    fn name(&self) -> &str {
        "offline"
    }

    fn availability(&self) -> std::result::Result<(), String> {
        Err("sampler service offline".to_string())
    }

    fn sample(
        &self,
        _category: DelayCategory,
        _model: &HierarchicalModel,
        _request: &SamplingRequest,
    ) -> Result<Vec<ChainTrace>> {
        unreachable!("an unavailable backend is never sampled")
    }
}

#[must_use]
pub fn stuck_backend() -> Arc<dyn BayesianBackend> {
    Arc::new(StuckBackend)
}

#[must_use]
pub fn offline_backend() -> Arc<dyn BayesianBackend> {
    Arc::new(OfflineBackend)
}
