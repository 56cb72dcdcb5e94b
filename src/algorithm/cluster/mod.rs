//! State typologies from standardized proxy features

pub mod kmeans;
pub mod profile;

pub use kmeans::{ClusterAssigner, ClusterAssignment, ClusterLabel};
pub use profile::{ClusterProfile, cluster_profiles};
