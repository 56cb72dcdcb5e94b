use tb_delay_synthesis::{BayesianOutcome, BayesianStateRegression, ProxyFeatureVector, RegressionConfig};

use crate::utils::{feature_vector, offline_backend, stuck_backend};

/// Ten states whose prevalence ratio rises with poverty
fn states() -> Vec<ProxyFeatureVector> {
    (0..10)
        .map(|i| {
            let x = i as f64;
            let poverty = 20.0 + 4.0 * x;
            let noise = [0.05, -0.08, 0.02, 0.1, -0.04, -0.06, 0.07, -0.01, 0.03, -0.09][i];
            let pn_ratio = (0.5 + 0.03 * poverty + noise).exp_m1();
            feature_vector(
                &format!("state-{i:02}"),
                [
                    pn_ratio,
                    1.0 + 0.1 * ((x * 1.7) % 3.0),
                    30.0 + 5.0 * ((x * 2.3) % 4.0),
                    40.0 + 3.0 * ((x * 3.1) % 5.0),
                    60.0 + 2.0 * ((x * 1.3) % 6.0),
                    4.0 + 0.3 * ((x * 2.9) % 3.0),
                    70.0 - 2.0 * ((x * 1.1) % 7.0),
                    poverty,
                ],
            )
        })
        .collect()
}

fn config() -> RegressionConfig {
    RegressionConfig::default().with_budget(2, 500, 500)
}

#[cfg(feature = "nuts")]
#[test]
fn test_posterior_tracks_the_observed_ratios() {
    let features = states();
    let outcome = BayesianStateRegression::new(config()).fit(&features).unwrap();
    let summary = outcome.posterior().expect("NUTS backend is compiled in");

    assert_eq!(summary.target, "pn_ratio");
    assert_eq!(summary.n_states, 10);
    assert_eq!(summary.predictors.len(), 7);
    assert_eq!(summary.coefficients.len(), 9);
    assert_eq!(summary.coefficients[0].parameter, "intercept");
    assert_eq!(summary.coefficients[8].parameter, "sigma");
    assert!(summary.diagnostics.max_r_hat < 1.1);

    // Centred predictors put the intercept at the mean log response
    let mean_log = features.iter().map(|f| f.values[0].ln_1p()).sum::<f64>() / 10.0;
    let intercept = summary.coefficient("intercept").unwrap();
    assert!((intercept.mean - mean_log).abs() < 0.5);
    assert!(summary.coefficient("poverty_pct").unwrap().mean > 0.0);
    assert!(summary.coefficient("sigma").unwrap().interval_low > 0.0);

    assert_eq!(summary.predictions.len(), 10);
    for prediction in &summary.predictions {
        assert!(prediction.interval_low <= prediction.posterior_mean);
        assert!(prediction.posterior_mean <= prediction.interval_high);
    }
    let low = summary.prediction_for("state-00").unwrap();
    let high = summary.prediction_for("state-09").unwrap();
    assert!(high.posterior_mean > low.posterior_mean);
}

#[cfg(feature = "nuts")]
#[test]
fn test_same_seed_same_regression() {
    let regression = BayesianStateRegression::new(config().with_budget(2, 200, 200));
    assert_eq!(regression.fit(&states()).unwrap(), regression.fit(&states()).unwrap());
}

#[test]
fn test_too_few_states_is_a_sentinel() {
    let regression = BayesianStateRegression::with_backend(config(), stuck_backend());
    let outcome = regression.fit(&states()[..5]).unwrap();
    match outcome {
        BayesianOutcome::Unavailable { reason } => assert!(reason.contains("at least 6")),
        other => panic!("expected a sentinel, got {other:?}"),
    }
}

#[test]
fn test_imputed_states_are_not_modelled() {
    let mut features = states();
    for feature in features.iter_mut().take(5) {
        feature.imputed[3] = true;
    }
    let regression = BayesianStateRegression::with_backend(config(), stuck_backend());
    match regression.fit(&features).unwrap() {
        BayesianOutcome::Unavailable { reason } => assert!(reason.starts_with("5 state(s)")),
        other => panic!("expected a sentinel, got {other:?}"),
    }
}

#[test]
fn test_no_backend_is_a_sentinel() {
    let outcome = BayesianStateRegression::without_backend(config())
        .fit(&states())
        .unwrap();
    assert!(!outcome.is_available());
}

#[test]
fn test_hierarchical_only_backend_is_a_sentinel() {
    let regression = BayesianStateRegression::with_backend(config(), stuck_backend());
    match regression.fit(&states()).unwrap() {
        BayesianOutcome::Unavailable { reason } => {
            assert!(reason.contains("cannot sample the state regression"));
        }
        other => panic!("expected a sentinel, got {other:?}"),
    }
}

#[test]
fn test_offline_backend_is_a_sentinel() {
    let regression = BayesianStateRegression::with_backend(config(), offline_backend());
    match regression.fit(&states()).unwrap() {
        BayesianOutcome::Unavailable { reason } => assert!(reason.contains("offline")),
        other => panic!("expected a sentinel, got {other:?}"),
    }
}

#[test]
fn test_min_states_is_configurable() {
    let regression =
        BayesianStateRegression::with_backend(config().with_min_states(12), stuck_backend());
    assert!(!regression.fit(&states()).unwrap().is_available());
}

#[test]
fn test_invalid_budget_rejected() {
    let regression =
        BayesianStateRegression::with_backend(config().with_budget(1, 500, 500), stuck_backend());
    assert!(regression.fit(&states()).is_err());
}
