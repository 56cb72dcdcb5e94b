//! Evidence-synthesis methods
//!
//! Each family is independent of the others; the pipeline feeds their
//! outputs into [`integration::EvidenceIntegrator`].

pub mod causal;
pub mod cluster;
pub mod integration;
pub mod meta;
pub mod pca;
pub mod proxy;
