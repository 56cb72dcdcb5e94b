//! JSON export: dashboard state profiles and the full report

use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::error::Result;
use crate::error::util::safe_create_file;
use crate::models::feature::ProxyFeature;
use crate::pipeline::SynthesisReport;
use crate::utils::logging::log_operation_complete;

/// Producer name written into every JSON hand-off
pub const GENERATED_BY: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

fn write_pretty<T: Serialize>(value: &T, path: &Path, purpose: &str) -> Result<()> {
    let file = safe_create_file(path, purpose)?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)?;
    Ok(())
}

/// Per-state cluster label, indicator means and predicted prevalence
/// ratio, in the dashboard layout
#[must_use]
pub fn state_profiles(report: &SynthesisReport) -> Value {
    let states: Vec<Value> = report
        .features
        .iter()
        .map(|feature| {
            let mut record = Map::new();
            record.insert("state".to_string(), Value::from(feature.state.clone()));
            let cluster = report
                .clusters
                .as_ref()
                .and_then(|c| c.label_of(&feature.state))
                .map_or(Value::Null, |label| json!(label));
            record.insert("delay_cluster".to_string(), cluster);
            for f in ProxyFeature::ALL {
                record.insert(f.name().to_string(), json!(feature.get(f)));
            }
            let prediction = report
                .regression
                .as_ref()
                .and_then(|r| r.prediction_for(&feature.state));
            record.insert(
                "pn_ratio_posterior_mean".to_string(),
                prediction.map_or(Value::Null, |p| json!(p.posterior_mean)),
            );
            record.insert(
                "pn_ratio_interval_low".to_string(),
                prediction.map_or(Value::Null, |p| json!(p.interval_low)),
            );
            record.insert(
                "pn_ratio_interval_high".to_string(),
                prediction.map_or(Value::Null, |p| json!(p.interval_high)),
            );
            Value::Object(record)
        })
        .collect();

    json!({
        "generated_by": GENERATED_BY,
        "generated_at": report.generated_at,
        "weights_version": report.config.weights.version,
        "states": states,
    })
}

/// Write the dashboard state profiles
pub fn write_state_profiles(report: &SynthesisReport, path: &Path) -> Result<()> {
    let profiles = state_profiles(report);
    write_pretty(&profiles, path, "state profiles")?;
    log_operation_complete("wrote", path, report.features.len(), None);
    Ok(())
}

/// Write the complete report
pub fn write_report_json(report: &SynthesisReport, path: &Path) -> Result<()> {
    write_pretty(report, path, "synthesis report")?;
    log_operation_complete("wrote", path, 1, None);
    Ok(())
}
