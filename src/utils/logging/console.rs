//! Console output for the command-line binary

use crate::algorithm::integration::CompositeRiskScore;
use crate::models::estimate::{CategoryEstimate, RegressionSummary};

/// Print the headline pooled estimate of each delay category
pub fn print_estimate_summary(estimates: &[CategoryEstimate]) {
    println!("Pooled delays:");
    for estimate in estimates {
        let (low, high) = estimate.interval();
        let flag = if estimate.is_lower_confidence() {
            " (lower confidence)"
        } else {
            ""
        };
        println!(
            "  {:<26} {:>7.1} [{:.1}, {:.1}] k={}{flag}",
            estimate.category.label(),
            estimate.value(),
            low,
            high,
            estimate.classical.k_studies
        );
    }
}

/// Print the `top` highest-priority states
pub fn print_ranking(scores: &[CompositeRiskScore], top: usize) {
    println!("Highest-priority states:");
    for score in scores.iter().take(top) {
        let cluster = score
            .cluster
            .map_or_else(|| "-".to_string(), |c| c.to_string());
        println!(
            "  {:>3}. {:<28} {:>8.2}  cluster {cluster}",
            score.priority_rank, score.state, score.composite_score
        );
    }
}

/// Print the state regression coefficients
pub fn print_regression(summary: &RegressionSummary) {
    println!(
        "log1p({}) regression over {} states ({:.0}% HDI):",
        summary.target,
        summary.n_states,
        summary.interval_level * 100.0
    );
    for coefficient in &summary.coefficients {
        let s = &coefficient.summary;
        println!(
            "  {:<28} {:>7.3} [{:.3}, {:.3}]",
            coefficient.parameter, s.mean, s.interval_low, s.interval_high
        );
    }
}
