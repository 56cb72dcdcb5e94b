//! Data models for the evidence-synthesis engine
//!
//! Inputs (delay observations, panel rows) and the immutable result records
//! each stage hands to the next.

pub mod delay;
pub mod estimate;
pub mod feature;
pub mod panel;

pub use delay::{DelayCategory, DelayObservation, DelayRecordStore, RawDelayRecord, VarianceSource};
pub use estimate::{
    BayesianOutcome, CategoryEstimate, ConvergenceDiagnostics, EstimateSource, IntervalKind,
    ParameterSummary, PooledEstimate, PosteriorSummary, RegressionCoefficient, RegressionSummary,
    StatePrediction, StudyEffect,
};
pub use feature::{FEATURE_COUNT, ProxyFeature, ProxyFeatureVector};
pub use panel::{PanelSchema, StateYearRecord};
