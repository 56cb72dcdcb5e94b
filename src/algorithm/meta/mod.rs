//! Meta-analytic pooling of study-level delays
//!
//! [`random_effects`] holds the closed-form DerSimonian-Laird pooler and
//! [`bayesian`] the hierarchical model sampled by MCMC, together with the
//! state-level regression that shares its sampler.

pub mod bayesian;
pub mod random_effects;

pub use bayesian::regression::BayesianStateRegression;
pub use bayesian::{BayesianBackend, BayesianHierarchicalPooler, default_backend};
pub use random_effects::{DerSimonianLaird, RandomEffectsPooler, dersimonian_laird};
