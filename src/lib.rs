//! Multi-method evidence synthesis of tuberculosis care-pathway delays.
//!
//! Pools literature-derived delay estimates (DerSimonian-Laird and a
//! Bayesian hierarchical model), builds state proxy indicators from a
//! survey panel, regresses the prevalence ratio on the other indicators,
//! derives typologies and principal components, encodes
//! causal assumptions as an evidence-typed DAG, and fuses everything into
//! a ranked state priority list.

pub mod adapters;
pub mod algorithm;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod utils;

// Core types
pub use config::{
    BayesianConfig, CausalConfig, ClusterConfig, PcaConfig, PoolingConfig, ProxyConfig,
    RegressionConfig, ScoreWeights, SynthesisConfig, VarianceImputation,
};
pub use error::{Result, SynthesisError};
pub use pipeline::{PipelineWarning, RunContext, SynthesisPipeline, SynthesisReport};

// Models
pub use models::{
    BayesianOutcome, CategoryEstimate, DelayCategory, DelayObservation, DelayRecordStore,
    EstimateSource, IntervalKind, PanelSchema, PooledEstimate, PosteriorSummary, ProxyFeature,
    ProxyFeatureVector, RawDelayRecord, RegressionSummary, StateYearRecord,
};

// Methods
pub use algorithm::causal::{
    CausalEdge, CausalGraph, CausalGraphEngine, CausalNode, EvidenceStrength, NodeCategory,
};
pub use algorithm::cluster::{ClusterAssigner, ClusterAssignment, ClusterLabel};
pub use algorithm::integration::{CompositeRiskScore, EvidenceIntegrator};
pub use algorithm::meta::{
    BayesianBackend, BayesianHierarchicalPooler, BayesianStateRegression, RandomEffectsPooler,
};
pub use algorithm::pca::{ComponentReducer, PcaResult};
pub use algorithm::proxy::{ImputationPolicy, ProxyFeatureBuilder};

// Input
pub use adapters::{BatchAdapter, DelayBatchAdapter, PanelBatchAdapter};
pub use utils::io::{export_report, read_parquet_path};

// Arrow types
pub use arrow::record_batch::RecordBatch;
