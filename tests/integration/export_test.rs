use std::fs;

use tb_delay_synthesis::utils::io::json::{GENERATED_BY, state_profiles};
use tb_delay_synthesis::{SynthesisPipeline, SynthesisReport, export_report};

use crate::utils::{STATES, delay_store, fast_config, panel};

fn report() -> SynthesisReport {
    SynthesisPipeline::new(fast_config())
        .without_backend()
        .run(&delay_store(), &panel())
        .unwrap()
}

#[test]
fn test_export_writes_every_file() {
    let dir = tempfile::tempdir().unwrap();
    let written = export_report(&report(), dir.path()).unwrap();

    assert_eq!(written.len(), 16);
    for path in &written {
        assert!(path.exists(), "{} missing", path.display());
    }
    let names: Vec<String> = written
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();
    assert!(names.contains(&"state_priority_ranking.csv".to_string()));
    assert!(names.contains(&"state_delay_profiles.json".to_string()));
    assert!(names.contains(&"regression_coefficients.csv".to_string()));
    assert!(names.contains(&"state_pn_predictions.csv".to_string()));
}

#[test]
fn test_regression_tables_without_posterior() {
    let dir = tempfile::tempdir().unwrap();
    let report = report();
    assert!(report.regression.is_none());
    export_report(&report, dir.path()).unwrap();

    let coefficients =
        fs::read_to_string(dir.path().join("regression_coefficients.csv")).unwrap();
    assert_eq!(
        coefficients.lines().collect::<Vec<_>>(),
        ["parameter,mean,sd,hdi_low,hdi_high,r_hat,ess"]
    );
    let predictions = fs::read_to_string(dir.path().join("state_pn_predictions.csv")).unwrap();
    assert_eq!(predictions.lines().count(), 1);
}

#[test]
fn test_ranking_table_contents() {
    let dir = tempfile::tempdir().unwrap();
    let report = report();
    export_report(&report, dir.path()).unwrap();

    let text = fs::read_to_string(dir.path().join("state_priority_ranking.csv")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines[0].starts_with("priority_rank,state,composite_score"));
    assert_eq!(lines.len(), STATES.len() + 1);
    assert!(lines[1].starts_with(&format!("1,{},", report.scores[0].state)));

    let pooled = fs::read_to_string(dir.path().join("pooled_estimates.csv")).unwrap();
    assert_eq!(pooled.lines().count(), 5);
    assert!(pooled.lines().skip(1).all(|l| l.contains(",classical,")));

    let features = fs::read_to_string(dir.path().join("proxy_features.csv")).unwrap();
    assert!(features.lines().any(|l| l.starts_with("Andhra Pradesh,")));
}

#[test]
fn test_state_profiles_json() {
    let dir = tempfile::tempdir().unwrap();
    let report = report();
    export_report(&report, dir.path()).unwrap();

    let text = fs::read_to_string(dir.path().join("state_delay_profiles.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["generated_by"], GENERATED_BY);
    assert_eq!(value["generated_at"], state_profiles(&report)["generated_at"]);
    assert_eq!(value["weights_version"], "v1");

    let states = value["states"].as_array().unwrap();
    assert_eq!(states.len(), STATES.len());
    let first = &states[0];
    assert_eq!(first["state"], STATES[0]);
    assert!(first["delay_cluster"].is_u64());
    assert!(first["poverty_pct"].is_f64());
    assert!(first["pn_ratio_posterior_mean"].is_null());
    assert!(first["pn_ratio_interval_high"].is_null());
}

#[test]
fn test_full_report_json() {
    let dir = tempfile::tempdir().unwrap();
    let report = report();
    export_report(&report, dir.path()).unwrap();

    let text = fs::read_to_string(dir.path().join("synthesis_report.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["estimates"].as_array().unwrap().len(), 4);
    assert_eq!(value["config"]["weights"]["ratio"], 0.4);
    assert_eq!(
        value["warnings"].as_array().unwrap().len(),
        report.warnings.len()
    );
}
