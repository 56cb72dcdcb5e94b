//! Progress reporting for sampling and restarts
//!
//! Bars are only drawn when the caller asks for them; otherwise a hidden
//! bar is returned so the calling code never branches on visibility.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Style for one sampler chain
pub const CHAIN_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) {msg}";

fn chain_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(CHAIN_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Create one bar per chain under a shared `MultiProgress`
///
/// # Arguments
/// * `chains` - Number of chains
/// * `iterations` - Warm-up plus retained draws per chain
/// * `label` - Prefix of each bar's message
/// * `visible` - Draw the bars; hidden bars are returned otherwise
#[must_use]
pub fn chain_progress_bars(
    chains: usize,
    iterations: usize,
    label: &str,
    visible: bool,
) -> (MultiProgress, Vec<ProgressBar>) {
    let mp = MultiProgress::new();
    let bars = (0..chains)
        .map(|chain| {
            if !visible {
                return ProgressBar::hidden();
            }
            let pb = mp.add(ProgressBar::new(iterations as u64));
            pb.set_style(chain_style());
            pb.set_message(format!("{label} chain {chain}"));
            pb
        })
        .collect();
    (mp, bars)
}
