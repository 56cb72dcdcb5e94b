//! Seeded k-means typologies of states
//!
//! Features are standardized, then k-means++ seeding and Lloyd iterations are
//! run for a fixed number of restarts in parallel. The restart with the
//! lowest inertia wins, ties going to the lowest restart index, so results
//! depend only on the seed and not on thread scheduling.

use std::collections::BTreeSet;
use std::fmt;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Serialize, Serializer};

use crate::algorithm::proxy::Standardizer;
use crate::config::ClusterConfig;
use crate::error::{Result, SynthesisError};
use crate::models::feature::{ProxyFeatureVector, feature_rows};

/// Typology tag of one state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClusterLabel {
    Cluster(usize),
    /// Every indicator of every state was imputed; no clustering was done
    InsufficientData,
}

impl ClusterLabel {
    #[must_use]
    pub const fn index(self) -> Option<usize> {
        match self {
            Self::Cluster(i) => Some(i),
            Self::InsufficientData => None,
        }
    }
}

impl fmt::Display for ClusterLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cluster(i) => write!(f, "{i}"),
            Self::InsufficientData => f.write_str("insufficient_data"),
        }
    }
}

impl Serialize for ClusterLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Cluster(i) => serializer.serialize_u64(*i as u64),
            Self::InsufficientData => serializer.serialize_str("insufficient_data"),
        }
    }
}

/// Labels of every state plus the fitted model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterAssignment {
    /// States in input order
    pub states: Vec<String>,
    /// One label per state, aligned with `states`
    pub labels: Vec<ClusterLabel>,
    /// Effective number of clusters after clamping
    pub k: usize,
    /// Within-cluster sum of squares in standardized units; `None` when no
    /// clustering was performed
    pub inertia: Option<f64>,
    /// Centroids in standardized units, indexed by label
    pub centroids: Vec<Vec<f64>>,
}

impl ClusterAssignment {
    /// Label of a state, if present
    #[must_use]
    pub fn label_of(&self, state: &str) -> Option<ClusterLabel> {
        self.states
            .iter()
            .position(|s| s == state)
            .map(|i| self.labels[i])
    }

    /// Number of distinct labels that were assigned
    #[must_use]
    pub fn distinct_labels(&self) -> usize {
        self.labels.iter().collect::<BTreeSet<_>>().len()
    }

    fn constant(features: &[ProxyFeatureVector], label: ClusterLabel, k: usize) -> Self {
        Self {
            states: features.iter().map(|f| f.state.clone()).collect(),
            labels: vec![label; features.len()],
            k,
            inertia: None,
            centroids: Vec::new(),
        }
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Index of the nearest centroid, lowest index on ties
fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (j, centroid) in centroids.iter().enumerate() {
        let d = squared_distance(point, centroid);
        if d < best_distance {
            best = j;
            best_distance = d;
        }
    }
    best
}

/// k-means++ seeding
fn seed_centroids(data: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(data[rng.random_range(0..data.len())].clone());
    while centroids.len() < k {
        let weights: Vec<f64> = data
            .iter()
            .map(|x| {
                centroids
                    .iter()
                    .map(|c| squared_distance(x, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();
        let chosen = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut cumulative = 0.0;
            weights
                .iter()
                .position(|w| {
                    cumulative += w;
                    cumulative > target
                })
                .unwrap_or(data.len() - 1)
        } else {
            rng.random_range(0..data.len())
        };
        centroids.push(data[chosen].clone());
    }
    centroids
}

/// Move the worst-fitting point of a multi-member cluster into each empty
/// cluster
fn fill_empty_clusters(data: &[Vec<f64>], labels: &mut [usize], centroids: &mut [Vec<f64>]) {
    let k = centroids.len();
    let mut counts = vec![0usize; k];
    for &l in labels.iter() {
        counts[l] += 1;
    }
    for empty in 0..k {
        if counts[empty] > 0 {
            continue;
        }
        let farthest = (0..data.len())
            .filter(|&i| counts[labels[i]] > 1)
            .map(|i| (i, squared_distance(&data[i], &centroids[labels[i]])))
            .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                Some((_, bd)) if bd >= d => best,
                _ => Some((i, d)),
            });
        let Some((i, _)) = farthest else {
            break;
        };
        counts[labels[i]] -= 1;
        labels[i] = empty;
        counts[empty] = 1;
        centroids[empty] = data[i].clone();
    }
}

fn update_centroids(data: &[Vec<f64>], labels: &[usize], centroids: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let dim = data[0].len();
    let mut sums = vec![vec![0.0; dim]; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];
    for (x, &l) in data.iter().zip(labels) {
        counts[l] += 1;
        for (s, v) in sums[l].iter_mut().zip(x) {
            *s += v;
        }
    }
    sums.into_iter()
        .zip(counts)
        .zip(centroids)
        .map(|((sum, count), old)| {
            if count == 0 {
                old.clone()
            } else {
                sum.into_iter().map(|s| s / count as f64).collect()
            }
        })
        .collect()
}

struct Fit {
    labels: Vec<usize>,
    centroids: Vec<Vec<f64>>,
    inertia: f64,
    iterations: usize,
}

fn lloyd(data: &[Vec<f64>], k: usize, seed: u64, config: &ClusterConfig) -> Fit {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = seed_centroids(data, k, &mut rng);
    let mut labels = vec![0; data.len()];
    let mut iterations = 0;

    for _ in 0..config.max_iterations {
        iterations += 1;
        for (label, x) in labels.iter_mut().zip(data) {
            *label = nearest(x, &centroids);
        }
        fill_empty_clusters(data, &mut labels, &mut centroids);
        let updated = update_centroids(data, &labels, &centroids);
        let shift: f64 = centroids
            .iter()
            .zip(&updated)
            .map(|(a, b)| squared_distance(a, b))
            .sum();
        centroids = updated;
        if shift <= config.tolerance {
            break;
        }
    }

    // Final assignment against the final centroids
    for (label, x) in labels.iter_mut().zip(data) {
        *label = nearest(x, &centroids);
    }
    fill_empty_clusters(data, &mut labels, &mut centroids);
    centroids = update_centroids(data, &labels, &centroids);
    let inertia = data
        .iter()
        .zip(&labels)
        .map(|(x, &l)| squared_distance(x, &centroids[l]))
        .sum();

    Fit {
        labels,
        centroids,
        inertia,
        iterations,
    }
}

/// Assigns states to delay typologies
#[derive(Debug, Clone, Default)]
pub struct ClusterAssigner {
    config: ClusterConfig,
}

impl ClusterAssigner {
    #[must_use]
    pub const fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// Cluster with the configured `k`
    pub fn assign_default(&self, features: &[ProxyFeatureVector]) -> Result<ClusterAssignment> {
        self.assign(features, self.config.k)
    }

    /// Cluster the states into at most `k` groups
    ///
    /// `k` is clamped to the number of distinct states. Fewer than two
    /// distinct states yield a single label; entirely imputed input yields
    /// [`ClusterLabel::InsufficientData`] for every state.
    ///
    /// # Errors
    /// * `Validation` for `k == 0` or zero restarts
    /// * `InsufficientData` for an empty feature table
    pub fn assign(&self, features: &[ProxyFeatureVector], k: usize) -> Result<ClusterAssignment> {
        if k == 0 {
            return Err(SynthesisError::Validation(
                "the number of clusters must be at least 1".to_string(),
            ));
        }
        if self.config.restarts == 0 {
            return Err(SynthesisError::Validation(
                "k-means needs at least one restart".to_string(),
            ));
        }
        if features.is_empty() {
            return Err(SynthesisError::insufficient("clustering", "no states"));
        }

        if features.iter().all(ProxyFeatureVector::is_entirely_imputed) {
            warn!("Proxy features missing for every state; clustering skipped");
            return Ok(ClusterAssignment::constant(
                features,
                ClusterLabel::InsufficientData,
                0,
            ));
        }

        let distinct = features
            .iter()
            .map(|f| f.state.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        let k = k.min(distinct.max(1));
        if distinct < 2 {
            debug!("Only {distinct} distinct state(s); single cluster assigned");
            return Ok(ClusterAssignment::constant(features, ClusterLabel::Cluster(0), 1));
        }

        let (_, data) = Standardizer::fit_transform(&feature_rows(features))?;
        let k = k.min(data.len());

        let fits: Vec<Fit> = (0..self.config.restarts)
            .into_par_iter()
            .map(|restart| lloyd(&data, k, self.config.seed.wrapping_add(restart as u64), &self.config))
            .collect();

        let mut best = 0;
        for (i, fit) in fits.iter().enumerate() {
            if fit.inertia < fits[best].inertia {
                best = i;
            }
        }
        let Some(fit) = fits.into_iter().nth(best) else {
            return Err(SynthesisError::insufficient("clustering", "no restart completed"));
        };

        // Renumber by first appearance
        let mut renumber: FxHashMap<usize, usize> = FxHashMap::default();
        for &l in &fit.labels {
            let next = renumber.len();
            renumber.entry(l).or_insert(next);
        }
        let mut centroids = vec![Vec::new(); renumber.len()];
        for (&old, &new) in &renumber {
            centroids[new] = fit.centroids[old].clone();
        }
        let labels: Vec<ClusterLabel> = fit
            .labels
            .iter()
            .map(|l| ClusterLabel::Cluster(renumber[l]))
            .collect();

        info!(
            "Assigned {} states to {} clusters (inertia {:.3}, restart {best}, {} iterations)",
            features.len(),
            renumber.len(),
            fit.inertia,
            fit.iterations
        );

        Ok(ClusterAssignment {
            states: features.iter().map(|f| f.state.clone()).collect(),
            labels,
            k,
            inertia: Some(fit.inertia),
            centroids,
        })
    }
}
