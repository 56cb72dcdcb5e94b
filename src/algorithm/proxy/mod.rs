//! State-level proxy indicators of care-seeking delay
//!
//! [`builder`] derives the indicators from the panel, [`imputation`] fills
//! what is missing and [`standardize`] prepares the matrix for clustering
//! and PCA.

pub mod builder;
pub mod imputation;
pub mod standardize;

pub use builder::ProxyFeatureBuilder;
pub use imputation::{ConstantFill, ImputationPolicy, MeanThenZero};
pub use standardize::Standardizer;
