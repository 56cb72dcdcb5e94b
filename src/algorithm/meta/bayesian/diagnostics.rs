//! MCMC convergence diagnostics and posterior summaries
//!
//! Split R-hat and effective sample size follow the rank-free variants used
//! by Stan: every chain is split in half and the halves are treated as
//! separate chains, and the autocorrelation sum is truncated with Geyer's
//! initial monotone sequence.

use crate::models::estimate::IntervalKind;

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

/// Split every chain into two halves of equal length
///
/// The middle draw of odd-length chains is dropped.
fn split_chains(chains: &[Vec<f64>]) -> Vec<&[f64]> {
    let mut halves = Vec::with_capacity(chains.len() * 2);
    for chain in chains {
        let half = chain.len() / 2;
        halves.push(&chain[..half]);
        halves.push(&chain[chain.len() - half..]);
    }
    halves
}

/// Split potential-scale-reduction statistic
///
/// Returns 1.0 when every draw is identical and infinity when the chains are
/// internally constant but disagree with each other.
#[must_use]
pub fn split_r_hat(chains: &[Vec<f64>]) -> f64 {
    let halves = split_chains(chains);
    let n = halves.first().map_or(0, |h| h.len());
    if halves.len() < 2 || n < 2 {
        return f64::NAN;
    }

    let means: Vec<f64> = halves.iter().map(|h| mean(h)).collect();
    let within = halves.iter().map(|h| sample_variance(h)).sum::<f64>() / halves.len() as f64;
    let between = n as f64 * sample_variance(&means);

    if within == 0.0 {
        return if between == 0.0 { 1.0 } else { f64::INFINITY };
    }

    let n = n as f64;
    let var_plus = (n - 1.0) / n * within + between / n;
    (var_plus / within).sqrt()
}

/// Biased autocovariance of `x` at `lag`
fn autocovariance(x: &[f64], mean: f64, lag: usize) -> f64 {
    let n = x.len();
    x[..n - lag]
        .iter()
        .zip(&x[lag..])
        .map(|(a, b)| (a - mean) * (b - mean))
        .sum::<f64>()
        / n as f64
}

/// Multi-chain effective sample size over split chains
///
/// Returns `NaN` when the draws have no variance.
#[must_use]
pub fn effective_sample_size(chains: &[Vec<f64>]) -> f64 {
    let halves = split_chains(chains);
    let m = halves.len();
    let n = halves.first().map_or(0, |h| h.len());
    if m < 2 || n < 4 {
        return f64::NAN;
    }

    let means: Vec<f64> = halves.iter().map(|h| mean(h)).collect();
    let mean_acov = |lag: usize| -> f64 {
        halves
            .iter()
            .zip(&means)
            .map(|(h, &mu)| autocovariance(h, mu, lag))
            .sum::<f64>()
            / m as f64
    };

    let nf = n as f64;
    let mean_var = mean_acov(0) * nf / (nf - 1.0);
    let var_plus = mean_var * (nf - 1.0) / nf + sample_variance(&means);
    if var_plus.is_nan() || var_plus <= 0.0 {
        return f64::NAN;
    }
    let rho = |lag: usize| 1.0 - (mean_var - mean_acov(lag)) / var_plus;

    let mut rho_hat = vec![0.0; n];
    rho_hat[0] = 1.0;
    let mut rho_even = 1.0;
    let mut rho_odd = rho(1);
    rho_hat[1] = rho_odd;

    // Geyer's initial positive sequence over pairs of lags
    let mut t = 1;
    while t + 4 < n && rho_even + rho_odd > 0.0 {
        rho_even = rho(t + 1);
        rho_odd = rho(t + 2);
        if rho_even + rho_odd >= 0.0 {
            rho_hat[t + 1] = rho_even;
            rho_hat[t + 2] = rho_odd;
        }
        t += 2;
    }
    let max_t = t;
    if rho_even > 0.0 && max_t + 1 < n {
        rho_hat[max_t + 1] = rho_even;
    }

    // Initial monotone sequence
    let mut t = 1;
    while t + 3 <= max_t {
        let previous = rho_hat[t - 1] + rho_hat[t];
        if rho_hat[t + 1] + rho_hat[t + 2] > previous {
            rho_hat[t + 1] = previous / 2.0;
            rho_hat[t + 2] = previous / 2.0;
        }
        t += 2;
    }

    let total = (m * n) as f64;
    let tail = rho_hat.get(max_t + 1).copied().unwrap_or(0.0);
    let tau_hat = (-1.0 + 2.0 * rho_hat[..=max_t].iter().sum::<f64>() + tail)
        .max(1.0 / total.log10());
    total / tau_hat
}

/// Empirical quantile with linear interpolation between order statistics
///
/// `sorted` must be sorted ascending and non-empty.
#[must_use]
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let fraction = position - lower as f64;
    sorted[lower] + fraction * (sorted[upper] - sorted[lower])
}

/// Shortest window of `sorted` holding `mass` of the draws
///
/// The window spans `floor(mass * n)` order statistics; the first of
/// several equally short windows wins. `sorted` must be sorted ascending and
/// non-empty.
#[must_use]
pub fn highest_density_interval(sorted: &[f64], mass: f64) -> (f64, f64) {
    let n = sorted.len();
    let span = ((mass.clamp(0.0, 1.0) * n as f64).floor() as usize).min(n - 1);
    let mut best = 0;
    for start in 1..n - span {
        if sorted[start + span] - sorted[start] < sorted[best + span] - sorted[best] {
            best = start;
        }
    }
    (sorted[best], sorted[best + span])
}

/// Interval of the given kind over sorted draws
#[must_use]
pub fn interval(sorted: &[f64], mass: f64, kind: IntervalKind) -> (f64, f64) {
    match kind {
        IntervalKind::HighestDensity => highest_density_interval(sorted, mass),
        IntervalKind::EqualTailed => {
            let tail = (1.0 - mass) / 2.0;
            (quantile(sorted, tail), quantile(sorted, 1.0 - tail))
        }
    }
}

/// Mean, SD and interval of pooled draws
#[must_use]
pub fn describe(draws: &[f64], credible_level: f64, kind: IntervalKind) -> (f64, f64, f64, f64) {
    let mut sorted = draws.to_vec();
    sorted.sort_by(f64::total_cmp);
    let (low, high) = interval(&sorted, credible_level, kind);
    (mean(draws), sample_variance(draws).sqrt(), low, high)
}
