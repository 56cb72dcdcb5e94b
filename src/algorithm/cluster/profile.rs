//! Per-cluster summaries of the raw proxy indicators

use std::collections::BTreeMap;

use serde::Serialize;

use super::kmeans::{ClusterAssignment, ClusterLabel};
use crate::models::feature::{FEATURE_COUNT, ProxyFeature, ProxyFeatureVector};

/// Size and mean indicators of one typology
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterProfile {
    pub label: ClusterLabel,
    /// Member states, sorted
    pub states: Vec<String>,
    /// Mean of each indicator in raw units, [`ProxyFeature::ALL`] order
    pub means: [f64; FEATURE_COUNT],
}

impl ClusterProfile {
    #[must_use]
    pub fn size(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub const fn mean(&self, feature: ProxyFeature) -> f64 {
        self.means[feature.index()]
    }
}

/// One profile per assigned label, ordered by label
///
/// States missing from `features` are ignored.
#[must_use]
pub fn cluster_profiles(
    assignment: &ClusterAssignment,
    features: &[ProxyFeatureVector],
) -> Vec<ClusterProfile> {
    let mut members: BTreeMap<ClusterLabel, Vec<&ProxyFeatureVector>> = BTreeMap::new();
    for feature in features {
        if let Some(label) = assignment.label_of(&feature.state) {
            members.entry(label).or_default().push(feature);
        }
    }

    members
        .into_iter()
        .map(|(label, vectors)| {
            let n = vectors.len() as f64;
            let mut means = [0.0; FEATURE_COUNT];
            for v in &vectors {
                for (mean, value) in means.iter_mut().zip(v.values) {
                    *mean += value / n;
                }
            }
            let mut states: Vec<String> = vectors.iter().map(|v| v.state.clone()).collect();
            states.sort();
            ClusterProfile {
                label,
                states,
                means,
            }
        })
        .collect()
}
