//! End-to-end synthesis run
//!
//! Stages run in a fixed order, each reading the outputs of earlier stages
//! and the [`RunContext`]. Recoverable failures (non-convergence, too few
//! states, no backend) become warnings and the run continues with the
//! classical result or without the optional output; structural failures
//! (cyclic graph, missing required panel field) abort the run.

pub mod context;
pub mod report;

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};

use crate::algorithm::causal::{CausalEdge, CausalGraph, CausalGraphEngine, CausalNode};
use crate::algorithm::cluster::{ClusterAssigner, ClusterAssignment, ClusterLabel, cluster_profiles};
use crate::algorithm::integration::EvidenceIntegrator;
use crate::algorithm::meta::{
    BayesianBackend, BayesianHierarchicalPooler, BayesianStateRegression, RandomEffectsPooler,
};
use crate::algorithm::pca::{ComponentReducer, PcaResult};
use crate::algorithm::proxy::{ImputationPolicy, ProxyFeatureBuilder};
use crate::config::SynthesisConfig;
use crate::error::{Result, SynthesisError};
use crate::models::delay::DelayRecordStore;
use crate::models::estimate::{BayesianOutcome, CategoryEstimate, EstimateSource, RegressionSummary};
use crate::models::feature::ProxyFeatureVector;
use crate::models::panel::{PanelSchema, StateYearRecord};
use crate::utils::logging::log_stage_complete;

pub use context::{PipelineWarning, RunContext};
pub use report::{PcaSummary, SynthesisReport};

const TOTAL_STEPS: usize = 7;

/// Runs every method and fuses the results
pub struct SynthesisPipeline {
    config: SynthesisConfig,
    bayesian: BayesianHierarchicalPooler,
    regression: BayesianStateRegression,
    proxy: ProxyFeatureBuilder,
    causal_model: Option<(Vec<CausalNode>, Vec<CausalEdge>)>,
}

impl std::fmt::Debug for SynthesisPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisPipeline")
            .field("config", &self.config)
            .field("bayesian", &self.bayesian)
            .field("regression", &self.regression)
            .field("custom_causal_model", &self.causal_model.is_some())
            .finish_non_exhaustive()
    }
}

impl SynthesisPipeline {
    /// Pipeline with the backend compiled into this build and the default
    /// delay DAG
    #[must_use]
    pub fn new(config: SynthesisConfig) -> Self {
        Self {
            bayesian: BayesianHierarchicalPooler::new(config.bayesian.clone()),
            regression: BayesianStateRegression::new(config.regression.clone()),
            proxy: ProxyFeatureBuilder::new(config.proxy.clone()),
            causal_model: None,
            config,
        }
    }

    /// Use an explicit Bayesian backend
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn BayesianBackend>) -> Self {
        self.bayesian =
            BayesianHierarchicalPooler::with_backend(self.config.bayesian.clone(), Arc::clone(&backend));
        self.regression = BayesianStateRegression::with_backend(self.config.regression.clone(), backend);
        self
    }

    /// Run without any Bayesian backend
    #[must_use]
    pub fn without_backend(mut self) -> Self {
        self.bayesian = BayesianHierarchicalPooler::without_backend(self.config.bayesian.clone());
        self.regression = BayesianStateRegression::without_backend(self.config.regression.clone());
        self
    }

    /// Replace the missing-value policy of the proxy features
    #[must_use]
    pub fn with_imputation(mut self, policy: Box<dyn ImputationPolicy>) -> Self {
        self.proxy = self.proxy.with_policy(policy);
        self
    }

    /// Read the panel with a different field schema
    #[must_use]
    pub fn with_panel_schema(mut self, schema: PanelSchema) -> Self {
        self.proxy = self.proxy.with_schema(schema);
        self
    }

    /// Use a custom causal model instead of the default delay DAG
    #[must_use]
    pub fn with_causal_model(mut self, nodes: Vec<CausalNode>, edges: Vec<CausalEdge>) -> Self {
        self.causal_model = Some((nodes, edges));
        self
    }

    #[must_use]
    pub const fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Run every stage
    ///
    /// # Errors
    /// Fails only on unrecoverable errors: a cyclic causal model, a required
    /// panel field missing everywhere, or malformed configuration.
    pub fn run(&self, store: &DelayRecordStore, panel: &[StateYearRecord]) -> Result<SynthesisReport> {
        let run_start = Instant::now();
        info!("Starting evidence synthesis");
        info!("Configuration: {}", self.config);
        let mut ctx = RunContext::new(self.config.clone());

        let step = |n: usize, what: &str| info!("[Step {n}/{TOTAL_STEPS}] {what}");

        step(1, "Pooling delay estimates");
        let start = Instant::now();
        let estimates = self.pool_delays(store, &mut ctx)?;
        log_stage_complete("pooling", &format!("{} categories", estimates.len()), start.elapsed());

        step(2, "Building proxy features");
        let start = Instant::now();
        let features = self.build_features(panel, &mut ctx)?;
        log_stage_complete("proxy", &format!("{} states", features.len()), start.elapsed());

        step(3, "Assigning state typologies");
        let start = Instant::now();
        let clusters = Self::assign_clusters(&features, &mut ctx)?;
        let profiles = clusters
            .as_ref()
            .map(|c| cluster_profiles(c, &features))
            .unwrap_or_default();
        log_stage_complete("clustering", &format!("{} profiles", profiles.len()), start.elapsed());

        step(4, "Regressing prevalence ratios on state proxies");
        let start = Instant::now();
        let regression = self.regress(&features, &mut ctx)?;
        log_stage_complete(
            "regression",
            &format!("{} predictions", regression.as_ref().map_or(0, |r| r.predictions.len())),
            start.elapsed(),
        );

        step(5, "Reducing proxy features to components");
        let start = Instant::now();
        let pca = Self::reduce(&features, &mut ctx)?;
        log_stage_complete(
            "pca",
            &format!("{} components", pca.as_ref().map_or(0, PcaResult::n_components)),
            start.elapsed(),
        );

        step(6, "Analysing the causal model");
        let start = Instant::now();
        let engine = CausalGraphEngine::new(self.config.causal.clone());
        let graph = self.causal_graph(&engine)?;
        let outcomes = graph.outcomes();
        if outcomes.is_empty() {
            ctx.warn("causal", "causal model has no outcome nodes; no paths enumerated");
        }
        let paths = engine.enumerate_paths(&graph, &outcomes)?;
        let influence = engine.influence_scores(&graph);
        let structure = engine.structure_summary(&graph);
        log_stage_complete("causal", &format!("{} paths", paths.len()), start.elapsed());

        step(7, "Integrating evidence");
        let start = Instant::now();
        let integrator =
            EvidenceIntegrator::new(self.config.weights.clone(), self.config.causal.clone());
        let scores = integrator.integrate(
            &estimates,
            clusters.as_ref(),
            pca.as_ref(),
            &influence,
            &features,
        )?;
        let method_summary = integrator.method_summary(&estimates, pca.as_ref(), Some(&structure));
        log_stage_complete("integration", &format!("{} states ranked", scores.len()), start.elapsed());

        info!(
            "Evidence synthesis finished in {:.2?} with {} warning(s)",
            run_start.elapsed(),
            ctx.warnings().len()
        );

        Ok(SynthesisReport {
            generated_at: chrono::Utc::now().to_rfc3339(),
            config: self.config.clone(),
            panel_schema_version: self.proxy.schema().version.clone(),
            estimates,
            features,
            clusters,
            cluster_profiles: profiles,
            regression,
            pca: pca.as_ref().map(|p| PcaSummary::from_result(p, &self.config.pca)),
            structure,
            paths,
            influence,
            scores,
            method_summary,
            warnings: ctx.into_warnings(),
        })
    }

    /// Classical pooling of every category, upgraded to the posterior when
    /// Bayesian pooling is enabled and converges
    fn pool_delays(&self, store: &DelayRecordStore, ctx: &mut RunContext) -> Result<Vec<CategoryEstimate>> {
        if store.is_empty() {
            ctx.warn("pooling", "no usable delay observations");
            return Ok(Vec::new());
        }
        if store.rejected() > 0 {
            ctx.warn(
                "pooling",
                format!("{} extracted records had an unusable delay effect", store.rejected()),
            );
        }

        let classical_pooler = RandomEffectsPooler::new(self.config.pooling.clone());
        let mut estimates = Vec::new();
        for category in store.categories() {
            let observations = store.by_category(category);
            let classical = match classical_pooler.pool(&observations) {
                Ok(estimate) => estimate,
                Err(e) if e.is_recoverable() => {
                    ctx.warn("pooling", format!("{category}: {e}"));
                    continue;
                }
                Err(e) => return Err(e),
            };

            let (bayesian, source) = if self.config.bayesian.enabled {
                match self.bayesian.pool(&observations) {
                    Ok(BayesianOutcome::Posterior(posterior)) => {
                        (Some(*posterior), EstimateSource::Bayesian)
                    }
                    Ok(BayesianOutcome::Unavailable { reason }) => {
                        ctx.warn("bayesian", format!("{category}: {reason}"));
                        (None, EstimateSource::Classical)
                    }
                    Err(e @ SynthesisError::Convergence { .. }) => {
                        ctx.warn(
                            "bayesian",
                            format!("{category}: {e}; classical estimate used with lower confidence"),
                        );
                        (None, EstimateSource::ClassicalFallback { reason: e.to_string() })
                    }
                    Err(e) if e.is_recoverable() => {
                        ctx.warn("bayesian", format!("{category}: {e}"));
                        (None, EstimateSource::Classical)
                    }
                    Err(e) => return Err(e),
                }
            } else {
                debug!("{category}: Bayesian pooling disabled");
                (None, EstimateSource::Classical)
            };

            estimates.push(CategoryEstimate {
                category,
                classical,
                bayesian,
                source,
            });
        }
        Ok(estimates)
    }

    fn build_features(
        &self,
        panel: &[StateYearRecord],
        ctx: &mut RunContext,
    ) -> Result<Vec<ProxyFeatureVector>> {
        let features = match self.proxy.build(panel) {
            Ok(features) => features,
            Err(e) if e.is_recoverable() => {
                ctx.warn("proxy", e.to_string());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        if self.config.proxy.prevalence_cases.is_none() {
            ctx.warn(
                "proxy",
                "no prevalence survey case count; pn_ratio imputed for every state",
            );
        }
        let empty: Vec<&str> = features
            .iter()
            .filter(|f| f.is_entirely_imputed())
            .map(|f| f.state.as_str())
            .collect();
        if !empty.is_empty() {
            ctx.warn(
                "proxy",
                format!("every indicator imputed for {}", empty.join(", ")),
            );
        }
        Ok(features)
    }

    fn assign_clusters(
        features: &[ProxyFeatureVector],
        ctx: &mut RunContext,
    ) -> Result<Option<ClusterAssignment>> {
        if features.is_empty() {
            return Ok(None);
        }
        let assigner = ClusterAssigner::new(ctx.config().cluster.clone());
        match assigner.assign_default(features) {
            Ok(assignment) => {
                if assignment.labels.contains(&ClusterLabel::InsufficientData) {
                    ctx.warn("clustering", "no observed indicators; states left unclustered");
                } else if assignment.k < ctx.config().cluster.k {
                    ctx.warn(
                        "clustering",
                        format!(
                            "k reduced from {} to {} for {} states",
                            ctx.config().cluster.k,
                            assignment.k,
                            features.len()
                        ),
                    );
                }
                Ok(Some(assignment))
            }
            Err(e) if e.is_recoverable() => {
                ctx.warn("clustering", e.to_string());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn regress(
        &self,
        features: &[ProxyFeatureVector],
        ctx: &mut RunContext,
    ) -> Result<Option<RegressionSummary>> {
        if !self.config.regression.enabled {
            debug!("State regression disabled");
            return Ok(None);
        }
        if features.is_empty() {
            return Ok(None);
        }
        match self.regression.fit(features) {
            Ok(BayesianOutcome::Posterior(summary)) => {
                if !summary.converged {
                    ctx.warn(
                        "regression",
                        format!(
                            "posterior did not converge (R-hat {:.3}, ESS {:.0}); interpret predictions with care",
                            summary.diagnostics.max_r_hat, summary.diagnostics.min_ess
                        ),
                    );
                }
                Ok(Some(*summary))
            }
            Ok(BayesianOutcome::Unavailable { reason }) => {
                ctx.warn("regression", reason);
                Ok(None)
            }
            Err(e) if e.is_recoverable() => {
                ctx.warn("regression", e.to_string());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn reduce(features: &[ProxyFeatureVector], ctx: &mut RunContext) -> Result<Option<PcaResult>> {
        if features.is_empty() {
            return Ok(None);
        }
        match ComponentReducer::new(ctx.config().pca.clone()).reduce(features) {
            Ok(result) => Ok(Some(result)),
            Err(e) if e.is_recoverable() => {
                ctx.warn("pca", e.to_string());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn causal_graph(&self, engine: &CausalGraphEngine) -> Result<CausalGraph> {
        match &self.causal_model {
            Some((nodes, edges)) => engine.build_with_nodes(nodes, edges),
            None => engine.default_delay_dag(),
        }
    }
}
