//! Derivation of the eight proxy indicators from the state-year panel

use std::collections::BTreeMap;

use log::{debug, info, warn};

use super::imputation::{ImputationPolicy, MeanThenZero, PartialRow};
use crate::config::ProxyConfig;
use crate::error::{Result, SynthesisError};
use crate::models::feature::{FEATURE_COUNT, ProxyFeature, ProxyFeatureVector};
use crate::models::panel::{PanelSchema, StateYearRecord, fields};

/// `numerator / denominator`, missing when either is absent or the
/// denominator is zero
fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let denominator = denominator.filter(|&d| d != 0.0)?;
    Some(numerator? / denominator).filter(|v| v.is_finite())
}

/// Builds one [`ProxyFeatureVector`] per state
pub struct ProxyFeatureBuilder {
    schema: PanelSchema,
    config: ProxyConfig,
    policy: Box<dyn ImputationPolicy>,
}

impl Default for ProxyFeatureBuilder {
    fn default() -> Self {
        Self::new(ProxyConfig::default())
    }
}

impl ProxyFeatureBuilder {
    /// Builder with the default schema and mean-then-zero imputation
    #[must_use]
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            schema: PanelSchema::default(),
            config,
            policy: Box::new(MeanThenZero),
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: PanelSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Substitute the missing-value policy
    #[must_use]
    pub fn with_policy(mut self, policy: Box<dyn ImputationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn schema(&self) -> &PanelSchema {
        &self.schema
    }

    /// Raw indicators of one panel row, before aggregation and imputation
    ///
    /// `total_population` is the population summed over every row of the
    /// panel, used to apportion the national prevalence case count.
    #[must_use]
    pub fn row_features(&self, row: &StateYearRecord, total_population: f64) -> PartialRow {
        let population = row.get(fields::POPULATION);
        let households = row.get(fields::HOUSEHOLDS);
        let notifications = self.schema.notifications(row);

        let prevalence_proxy = match self.config.prevalence_cases {
            Some(cases) if cases != 0.0 && total_population > 0.0 => {
                population.map(|p| cases * p / total_population)
            }
            _ => None,
        };
        let deaths = row.get(fields::TB_DEATHS).unwrap_or(0.0);
        let incidence_proxy = notifications.map(|n| n + deaths);

        let mut features = [None; FEATURE_COUNT];
        features[ProxyFeature::PnRatio.index()] = ratio(prevalence_proxy, notifications);
        features[ProxyFeature::InRatio.index()] = ratio(incidence_proxy, notifications);
        features[ProxyFeature::SymptomaticNoCarePct.index()] =
            row.get(fields::IMPROVED_SANITATION_PCT).map(|pct| 100.0 - pct);
        features[ProxyFeature::PrivateFirstProviderPct.index()] =
            ratio(row.get(fields::ASSET_HOUSEHOLDS), households).map(|r| 100.0 * r);
        features[ProxyFeature::BactConfirmedPct.index()] = ratio(
            row.get(fields::TREATED_SUCCESSFULLY_2023),
            row.get(fields::NOTIFIED_2023),
        )
        .map(|r| 100.0 * r);
        features[ProxyFeature::CrowdingIndex.index()] = ratio(population, households);
        features[ProxyFeature::LiteracyPct.index()] = row.get(fields::LITERACY_PCT);
        features[ProxyFeature::PovertyPct.index()] =
            row.get(fields::CLEAN_FUEL_PCT).map(|pct| 100.0 - pct);
        features
    }

    /// Derive, aggregate and impute the indicators of every state
    ///
    /// States are returned sorted by name. Multiple years of one state are
    /// averaged over their non-missing values before imputation.
    ///
    /// # Errors
    /// * `InsufficientData` for an empty panel
    /// * `MissingFeature` when a required field is absent from every row
    pub fn build(&self, panel: &[StateYearRecord]) -> Result<Vec<ProxyFeatureVector>> {
        if panel.is_empty() {
            return Err(SynthesisError::insufficient(
                "proxy features",
                "the state-year panel has no rows",
            ));
        }
        self.schema.check_required(panel)?;

        let total_population: f64 = panel
            .iter()
            .filter_map(|row| row.get(fields::POPULATION))
            .filter(|&p| p != 0.0)
            .sum();
        if self.config.prevalence_cases.is_none() {
            warn!("No prevalence survey case count supplied; pn_ratio will be imputed");
        }

        let mut by_state: BTreeMap<&str, Vec<PartialRow>> = BTreeMap::new();
        for row in panel {
            by_state
                .entry(row.state.as_str())
                .or_default()
                .push(self.row_features(row, total_population));
        }

        let states: Vec<&str> = by_state.keys().copied().collect();
        let aggregated: Vec<PartialRow> = by_state
            .values()
            .map(|rows| {
                let mut mean = [None; FEATURE_COUNT];
                for (col, slot) in mean.iter_mut().enumerate() {
                    let present: Vec<f64> = rows.iter().filter_map(|r| r[col]).collect();
                    if !present.is_empty() {
                        *slot = Some(present.iter().sum::<f64>() / present.len() as f64);
                    }
                }
                mean
            })
            .collect();

        for feature in ProxyFeature::ALL {
            let missing = aggregated
                .iter()
                .filter(|row| row[feature.index()].is_none())
                .count();
            if missing == aggregated.len() {
                warn!("{feature}: missing for every state, imputed by '{}'", self.policy.name());
            } else if missing > 0 {
                debug!("{feature}: imputed for {missing} of {} states", aggregated.len());
            }
        }

        let filled = self.policy.impute(&aggregated);
        let vectors: Vec<ProxyFeatureVector> = states
            .iter()
            .zip(aggregated.iter().zip(filled))
            .map(|(state, (raw, values))| ProxyFeatureVector {
                state: (*state).to_string(),
                values,
                imputed: raw.map(|v| v.is_none()),
                years: by_state[state].len(),
            })
            .collect();

        info!(
            "Built proxy features for {} states from {} panel rows",
            vectors.len(),
            panel.len()
        );
        Ok(vectors)
    }
}
