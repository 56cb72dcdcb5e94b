//! Delimited-text export of the report tables

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::util::safe_create_file;
use crate::error::{Result, SynthesisError};
use crate::models::estimate::EstimateSource;
use crate::models::feature::ProxyFeature;
use crate::pipeline::SynthesisReport;
use crate::utils::logging::log_operation_complete;

/// Escape a string for CSV output
#[must_use]
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn num(value: f64) -> String {
    format!("{value:.6}")
}

fn opt_num(value: Option<f64>) -> String {
    value.map(num).unwrap_or_default()
}

/// Buffered CSV table writer
struct CsvTable {
    path: PathBuf,
    writer: BufWriter<File>,
    rows: usize,
}

impl CsvTable {
    fn create(path: &Path, header: &[&str]) -> Result<Self> {
        let file = safe_create_file(path, "CSV table")?;
        let mut table = Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            rows: 0,
        };
        table.line(&header.iter().map(|h| (*h).to_string()).collect::<Vec<_>>())?;
        table.rows = 0;
        Ok(table)
    }

    fn line(&mut self, cells: &[String]) -> Result<()> {
        let escaped: Vec<String> = cells.iter().map(|c| escape_csv(c)).collect();
        writeln!(self.writer, "{}", escaped.join(",")).map_err(|e| {
            SynthesisError::io(format!("Failed to write to {}", self.path.display()), e)
        })?;
        self.rows += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<PathBuf> {
        self.writer.flush().map_err(|e| {
            SynthesisError::io(format!("Failed to flush {}", self.path.display()), e)
        })?;
        log_operation_complete("wrote", &self.path, self.rows, None);
        Ok(self.path)
    }
}

/// Headline and classical pooled estimates, one row per category
pub fn write_pooled_estimates(report: &SynthesisReport, path: &Path) -> Result<PathBuf> {
    let mut table = CsvTable::create(
        path,
        &[
            "category",
            "source",
            "estimate",
            "interval_low",
            "interval_high",
            "lower_confidence",
            "classical_estimate",
            "classical_se",
            "classical_low",
            "classical_high",
            "tau_squared",
            "q_statistic",
            "i_squared",
            "q_p_value",
            "k_studies",
            "posterior_tau",
            "max_r_hat",
            "min_ess",
            "divergences",
        ],
    )?;
    for estimate in &report.estimates {
        let (low, high) = estimate.interval();
        let c = &estimate.classical;
        let posterior = estimate.bayesian.as_ref();
        let source = match &estimate.source {
            EstimateSource::Bayesian => "bayesian",
            EstimateSource::Classical => "classical",
            EstimateSource::ClassicalFallback { .. } => "classical_fallback",
        };
        table.line(&[
            estimate.category.to_string(),
            source.to_string(),
            num(estimate.value()),
            num(low),
            num(high),
            estimate.is_lower_confidence().to_string(),
            num(c.point_estimate),
            num(c.standard_error),
            num(c.interval_low),
            num(c.interval_high),
            num(c.heterogeneity_tau_squared),
            num(c.q_statistic),
            num(c.i_squared),
            opt_num(c.q_p_value),
            c.k_studies.to_string(),
            opt_num(posterior.map(|p| p.tau.mean)),
            opt_num(posterior.map(|p| p.diagnostics.max_r_hat)),
            opt_num(posterior.map(|p| p.diagnostics.min_ess)),
            posterior
                .map(|p| p.diagnostics.divergences.to_string())
                .unwrap_or_default(),
        ])?;
    }
    table.finish()
}

/// Shrunken study effects of every Bayesian estimate
pub fn write_study_effects(report: &SynthesisReport, path: &Path) -> Result<PathBuf> {
    let mut table = CsvTable::create(
        path,
        &["category", "study_id", "observed", "posterior_mean", "posterior_sd"],
    )?;
    for posterior in report.estimates.iter().filter_map(|e| e.bayesian.as_ref()) {
        for effect in &posterior.study_effects {
            table.line(&[
                posterior.category.to_string(),
                effect.study_id.clone(),
                num(effect.observed),
                num(effect.posterior_mean),
                num(effect.posterior_sd),
            ])?;
        }
    }
    table.finish()
}

/// Proxy features with their cluster label
pub fn write_proxy_features(report: &SynthesisReport, path: &Path) -> Result<PathBuf> {
    let mut header = vec!["state", "years", "delay_cluster"];
    header.extend(ProxyFeature::ALL.iter().map(|f| f.name()));
    header.push("imputed");
    let mut table = CsvTable::create(path, &header)?;

    for feature in &report.features {
        let cluster = report
            .clusters
            .as_ref()
            .and_then(|c| c.label_of(&feature.state))
            .map(|l| l.to_string())
            .unwrap_or_default();
        let mut cells = vec![feature.state.clone(), feature.years.to_string(), cluster];
        cells.extend(feature.values.iter().map(|v| num(*v)));
        cells.push(
            ProxyFeature::ALL
                .iter()
                .filter(|f| feature.was_imputed(**f))
                .map(|f| f.name())
                .collect::<Vec<_>>()
                .join(";"),
        );
        table.line(&cells)?;
    }
    table.finish()
}

/// Posterior coefficients of the state regression
pub fn write_regression_coefficients(report: &SynthesisReport, path: &Path) -> Result<PathBuf> {
    let mut table = CsvTable::create(
        path,
        &["parameter", "mean", "sd", "hdi_low", "hdi_high", "r_hat", "ess"],
    )?;
    for coefficient in report.regression.iter().flat_map(|r| &r.coefficients) {
        let s = &coefficient.summary;
        table.line(&[
            coefficient.parameter.clone(),
            num(s.mean),
            num(s.sd),
            num(s.interval_low),
            num(s.interval_high),
            num(s.r_hat),
            num(s.ess),
        ])?;
    }
    table.finish()
}

/// Predicted prevalence ratio per modelled state
pub fn write_state_predictions(report: &SynthesisReport, path: &Path) -> Result<PathBuf> {
    let mut table = CsvTable::create(
        path,
        &["state", "observed", "posterior_mean", "interval_low", "interval_high", "delay_cluster"],
    )?;
    for prediction in report.regression.iter().flat_map(|r| &r.predictions) {
        let cluster = report
            .clusters
            .as_ref()
            .and_then(|c| c.label_of(&prediction.state))
            .map(|l| l.to_string())
            .unwrap_or_default();
        table.line(&[
            prediction.state.clone(),
            num(prediction.observed),
            num(prediction.posterior_mean),
            num(prediction.interval_low),
            num(prediction.interval_high),
            cluster,
        ])?;
    }
    table.finish()
}

/// Mean indicators per typology
pub fn write_cluster_profiles(report: &SynthesisReport, path: &Path) -> Result<PathBuf> {
    let mut header = vec!["delay_cluster", "states"];
    header.extend(ProxyFeature::ALL.iter().map(|f| f.name()));
    let mut table = CsvTable::create(path, &header)?;
    for profile in &report.cluster_profiles {
        let mut cells = vec![profile.label.to_string(), profile.size().to_string()];
        cells.extend(profile.means.iter().map(|v| num(*v)));
        table.line(&cells)?;
    }
    table.finish()
}

/// Variance explained per component
pub fn write_pca_variance(report: &SynthesisReport, path: &Path) -> Result<PathBuf> {
    let mut table = CsvTable::create(
        path,
        &["component", "eigenvalue", "explained_variance_ratio", "cumulative_variance", "description"],
    )?;
    if let Some(pca) = &report.pca {
        for (c, eigenvalue) in pca.eigenvalues.iter().enumerate() {
            let description = pca
                .interpretations
                .iter()
                .find(|i| i.component == c + 1)
                .map(|i| i.description.clone())
                .unwrap_or_default();
            table.line(&[
                format!("PC{}", c + 1),
                num(*eigenvalue),
                num(pca.explained_variance_ratio[c]),
                num(pca.cumulative_variance[c]),
                description,
            ])?;
        }
    }
    table.finish()
}

/// Long-format component loadings
pub fn write_pca_loadings(report: &SynthesisReport, path: &Path) -> Result<PathBuf> {
    let mut table = CsvTable::create(path, &["component", "feature", "loading"])?;
    for loading in report.pca.iter().flat_map(|p| &p.loadings) {
        table.line(&[
            format!("PC{}", loading.component),
            loading.feature.clone(),
            num(loading.loading),
        ])?;
    }
    table.finish()
}

/// Long-format component scores
pub fn write_pca_scores(report: &SynthesisReport, path: &Path) -> Result<PathBuf> {
    let mut table = CsvTable::create(path, &["state", "component", "score"])?;
    for score in report.pca.iter().flat_map(|p| &p.scores) {
        table.line(&[
            score.state.clone(),
            format!("PC{}", score.component),
            num(score.score),
        ])?;
    }
    table.finish()
}

/// Every enumerated causal path
pub fn write_causal_paths(report: &SynthesisReport, path: &Path) -> Result<PathBuf> {
    let mut table = CsvTable::create(
        path,
        &["outcome", "source", "path", "length", "mediated", "evidence_strengths", "evidence_score"],
    )?;
    for p in &report.paths {
        table.line(&[
            p.outcome.clone(),
            p.source.clone(),
            p.describe(),
            p.length().to_string(),
            p.is_mediated().to_string(),
            p.describe_strengths(),
            num(p.evidence_score),
        ])?;
    }
    table.finish()
}

/// Evidence-weighted influence of every node
pub fn write_causal_influence(report: &SynthesisReport, path: &Path) -> Result<PathBuf> {
    let mut table =
        CsvTable::create(path, &["node", "category", "descendants", "weighted_influence"])?;
    for node in &report.influence {
        table.line(&[
            node.node.clone(),
            node.category.as_str().to_string(),
            node.descendants.to_string(),
            num(node.weighted_influence),
        ])?;
    }
    table.finish()
}

/// Ranked composite risk scores
pub fn write_priority_ranking(report: &SynthesisReport, path: &Path) -> Result<PathBuf> {
    let mut table = CsvTable::create(
        path,
        &[
            "priority_rank",
            "state",
            "composite_score",
            "pn_ratio",
            "poverty_pct",
            "symptomatic_no_care_pct",
            "delay_cluster",
            "pc1",
            "pc2",
            "weights_version",
        ],
    )?;
    for score in &report.scores {
        table.line(&[
            score.priority_rank.to_string(),
            score.state.clone(),
            num(score.composite_score),
            num(score.pn_ratio),
            num(score.poverty_pct),
            num(score.symptomatic_no_care_pct),
            score.cluster.map(|c| c.to_string()).unwrap_or_default(),
            opt_num(score.pc1),
            opt_num(score.pc2),
            score.weights_version.clone(),
        ])?;
    }
    table.finish()
}

/// Cross-method summary table
pub fn write_method_summary(report: &SynthesisReport, path: &Path) -> Result<PathBuf> {
    let mut table = CsvTable::create(
        path,
        &["method", "metric", "value", "uncertainty", "confidence", "n"],
    )?;
    for row in &report.method_summary {
        table.line(&[
            row.method.clone(),
            row.metric.clone(),
            num(row.value),
            row.uncertainty.clone(),
            row.confidence.clone(),
            row.n.to_string(),
        ])?;
    }
    table.finish()
}

/// Warnings raised during the run
pub fn write_warnings(report: &SynthesisReport, path: &Path) -> Result<PathBuf> {
    let mut table = CsvTable::create(path, &["stage", "message"])?;
    for warning in &report.warnings {
        table.line(&[warning.stage.clone(), warning.message.clone()])?;
    }
    table.finish()
}

/// Write every table of the report into `dir`
///
/// # Returns
/// Paths of the written files
pub fn write_report_tables(report: &SynthesisReport, dir: &Path) -> Result<Vec<PathBuf>> {
    type Writer = fn(&SynthesisReport, &Path) -> Result<PathBuf>;
    let tables: [(&str, Writer); 14] = [
        ("pooled_estimates.csv", write_pooled_estimates),
        ("study_effects.csv", write_study_effects),
        ("proxy_features.csv", write_proxy_features),
        ("cluster_profiles.csv", write_cluster_profiles),
        ("regression_coefficients.csv", write_regression_coefficients),
        ("state_pn_predictions.csv", write_state_predictions),
        ("pca_variance.csv", write_pca_variance),
        ("pca_loadings.csv", write_pca_loadings),
        ("pca_scores.csv", write_pca_scores),
        ("causal_paths.csv", write_causal_paths),
        ("causal_influence.csv", write_causal_influence),
        ("state_priority_ranking.csv", write_priority_ranking),
        ("method_summary.csv", write_method_summary),
        ("warnings.csv", write_warnings),
    ];
    tables
        .iter()
        .map(|(name, write)| write(report, &dir.join(name)))
        .collect()
}
