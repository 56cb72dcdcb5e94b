//! No-U-Turn sampler with dual-averaging step size and a diagonal metric
//!
//! The tree building is the slice-sampling variant of Hoffman & Gelman
//! (2014, Algorithm 3). Warm-up adapts the step size towards a target mean
//! acceptance statistic and estimates a diagonal inverse mass matrix from
//! one window of warm-up draws, after which the step size is re-tuned.

use indicatif::ProgressBar;
use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;

use super::model::LogDensity;

/// Energy error beyond which a transition is flagged divergent
const MAX_ENERGY_ERROR: f64 = 1000.0;

/// Settings of a single chain
#[derive(Debug, Clone, PartialEq)]
pub struct NutsSettings {
    pub warmup: usize,
    pub draws: usize,
    pub target_accept: f64,
    pub max_tree_depth: usize,
}

/// Retained draws and adaptation results of one chain
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutput {
    /// One unconstrained position per retained draw
    pub draws: Vec<Vec<f64>>,
    /// Divergent transitions after warm-up
    pub divergences: usize,
    /// Mean acceptance statistic after warm-up
    pub mean_accept_stat: f64,
    pub step_size: f64,
}

#[derive(Debug, Clone)]
struct Point {
    position: Vec<f64>,
    momentum: Vec<f64>,
    grad: Vec<f64>,
    log_density: f64,
}

impl Point {
    fn at<M: LogDensity>(model: &M, position: Vec<f64>) -> Self {
        let mut grad = vec![0.0; position.len()];
        let log_density = model.log_density_grad(&position, &mut grad);
        Self {
            momentum: vec![0.0; position.len()],
            position,
            grad,
            log_density,
        }
    }

    /// Negative Hamiltonian; `-inf` outside the support
    fn joint(&self, inv_metric: &[f64]) -> f64 {
        if !self.log_density.is_finite() {
            return f64::NEG_INFINITY;
        }
        let kinetic: f64 = self
            .momentum
            .iter()
            .zip(inv_metric)
            .map(|(p, m)| p * p * m)
            .sum();
        self.log_density - 0.5 * kinetic
    }
}

/// Step-size adaptation of Hoffman & Gelman (2014, section 3.2)
#[derive(Debug, Clone)]
struct DualAveraging {
    target: f64,
    mu: f64,
    h_bar: f64,
    log_step: f64,
    log_step_bar: f64,
    iteration: f64,
}

impl DualAveraging {
    const GAMMA: f64 = 0.05;
    const T0: f64 = 10.0;
    const KAPPA: f64 = 0.75;

    fn new(initial_step: f64, target: f64) -> Self {
        Self {
            target,
            mu: (10.0 * initial_step).ln(),
            h_bar: 0.0,
            log_step: initial_step.ln(),
            log_step_bar: 0.0,
            iteration: 0.0,
        }
    }

    fn update(&mut self, accept_stat: f64) {
        self.iteration += 1.0;
        let t = self.iteration;
        let weight = 1.0 / (t + Self::T0);
        self.h_bar = (1.0 - weight) * self.h_bar + weight * (self.target - accept_stat);
        self.log_step = self.mu - t.sqrt() / Self::GAMMA * self.h_bar;
        let eta = t.powf(-Self::KAPPA);
        self.log_step_bar = eta * self.log_step + (1.0 - eta) * self.log_step_bar;
    }

    fn current(&self) -> f64 {
        self.log_step.exp()
    }

    fn adapted(&self) -> f64 {
        self.log_step_bar.exp()
    }
}

/// Online mean and variance for the mass-matrix window
#[derive(Debug, Clone)]
struct VarianceWindow {
    count: usize,
    mean: Vec<f64>,
    m2: Vec<f64>,
}

impl VarianceWindow {
    fn new(dim: usize) -> Self {
        Self {
            count: 0,
            mean: vec![0.0; dim],
            m2: vec![0.0; dim],
        }
    }

    fn push(&mut self, x: &[f64]) {
        self.count += 1;
        let n = self.count as f64;
        for (i, &xi) in x.iter().enumerate() {
            let delta = xi - self.mean[i];
            self.mean[i] += delta / n;
            self.m2[i] += delta * (xi - self.mean[i]);
        }
    }

    /// Sample variances shrunk towards a small constant
    fn regularized(&self) -> Option<Vec<f64>> {
        if self.count < 3 {
            return None;
        }
        let n = self.count as f64;
        Some(
            self.m2
                .iter()
                .map(|m2| {
                    let var = m2 / (n - 1.0);
                    (n / (n + 5.0)) * var + 1e-3 * (5.0 / (n + 5.0))
                })
                .collect(),
        )
    }
}

struct Tree {
    minus: Point,
    plus: Point,
    proposal: Point,
    weight: f64,
    keep_going: bool,
    sum_accept: f64,
    steps: usize,
    divergent: bool,
}

/// A single NUTS chain over a log density
pub struct NutsChain<'a, M: LogDensity> {
    model: &'a M,
    settings: NutsSettings,
    inv_metric: Vec<f64>,
    step_size: f64,
}

impl<'a, M: LogDensity> NutsChain<'a, M> {
    #[must_use]
    pub fn new(model: &'a M, settings: NutsSettings) -> Self {
        Self {
            inv_metric: vec![1.0; model.dim()],
            model,
            settings,
            step_size: 1.0,
        }
    }

    fn leapfrog(&self, point: &Point, step: f64) -> Point {
        let half: Vec<f64> = point
            .momentum
            .iter()
            .zip(&point.grad)
            .map(|(p, g)| p + 0.5 * step * g)
            .collect();
        let position: Vec<f64> = point
            .position
            .iter()
            .zip(&half)
            .zip(&self.inv_metric)
            .map(|((q, p), m)| q + step * m * p)
            .collect();
        let mut next = Point::at(self.model, position);
        next.momentum = half
            .iter()
            .zip(&next.grad)
            .map(|(p, g)| p + 0.5 * step * g)
            .collect();
        next
    }

    fn no_u_turn(&self, minus: &Point, plus: &Point) -> bool {
        let mut forward = 0.0;
        let mut backward = 0.0;
        for i in 0..minus.position.len() {
            let dq = plus.position[i] - minus.position[i];
            forward += dq * self.inv_metric[i] * plus.momentum[i];
            backward += dq * self.inv_metric[i] * minus.momentum[i];
        }
        forward >= 0.0 && backward >= 0.0
    }

    fn draw_momentum(&self, rng: &mut StdRng) -> Vec<f64> {
        self.inv_metric
            .iter()
            .map(|m| rng.sample::<f64, _>(StandardNormal) / m.sqrt())
            .collect()
    }

    /// Heuristic initial step size (Hoffman & Gelman 2014, Algorithm 4)
    fn find_reasonable_step(&mut self, current: &Point, rng: &mut StdRng) {
        let mut start = current.clone();
        start.momentum = self.draw_momentum(rng);
        let joint0 = start.joint(&self.inv_metric);

        let mut step = 1.0;
        let log_ratio = |s: f64| self.leapfrog(&start, s).joint(&self.inv_metric) - joint0;
        let mut delta = log_ratio(step);
        let direction = if delta.is_finite() && delta > 0.5_f64.ln() {
            1.0
        } else {
            -1.0
        };
        for _ in 0..100 {
            let delta_finite = if delta.is_finite() { delta } else { f64::NEG_INFINITY };
            if direction * delta_finite <= -direction * 2.0_f64.ln() {
                break;
            }
            step *= 2.0_f64.powf(direction);
            delta = log_ratio(step);
        }
        self.step_size = step;
    }

    fn build_tree(
        &self,
        start: &Point,
        log_slice: f64,
        direction: f64,
        depth: usize,
        joint0: f64,
        rng: &mut StdRng,
    ) -> Tree {
        if depth == 0 {
            let next = self.leapfrog(start, direction * self.step_size);
            let joint = next.joint(&self.inv_metric);
            let keep_going = log_slice < joint + MAX_ENERGY_ERROR;
            let accept = if joint.is_finite() {
                (joint - joint0).exp().min(1.0)
            } else {
                0.0
            };
            return Tree {
                minus: next.clone(),
                plus: next.clone(),
                proposal: next,
                weight: if log_slice <= joint { 1.0 } else { 0.0 },
                keep_going,
                sum_accept: accept,
                steps: 1,
                divergent: !keep_going,
            };
        }

        let mut tree = self.build_tree(start, log_slice, direction, depth - 1, joint0, rng);
        if !tree.keep_going {
            return tree;
        }

        let edge = if direction < 0.0 { &tree.minus } else { &tree.plus };
        let other = self.build_tree(edge, log_slice, direction, depth - 1, joint0, rng);
        if direction < 0.0 {
            tree.minus = other.minus;
        } else {
            tree.plus = other.plus;
        }

        let total = tree.weight + other.weight;
        if total > 0.0 && rng.random::<f64>() < other.weight / total {
            tree.proposal = other.proposal;
        }
        tree.weight = total;
        tree.sum_accept += other.sum_accept;
        tree.steps += other.steps;
        tree.divergent |= other.divergent;
        tree.keep_going = other.keep_going && self.no_u_turn(&tree.minus, &tree.plus);
        tree
    }

    /// One NUTS transition; returns the new point, accept statistic and
    /// whether a divergence occurred
    fn transition(&self, current: &Point, rng: &mut StdRng) -> (Point, f64, bool) {
        let mut start = current.clone();
        start.momentum = self.draw_momentum(rng);
        let joint0 = start.joint(&self.inv_metric);
        let log_slice = joint0 + (1.0 - rng.random::<f64>()).ln();

        let mut minus = start.clone();
        let mut plus = start.clone();
        let mut proposal = start;
        let mut weight = 1.0;
        let mut sum_accept = 0.0;
        let mut steps = 0usize;
        let mut divergent = false;

        for depth in 0..self.settings.max_tree_depth {
            let direction = if rng.random::<bool>() { 1.0 } else { -1.0 };
            let tree = if direction < 0.0 {
                let tree = self.build_tree(&minus, log_slice, direction, depth, joint0, rng);
                minus = tree.minus.clone();
                tree
            } else {
                let tree = self.build_tree(&plus, log_slice, direction, depth, joint0, rng);
                plus = tree.plus.clone();
                tree
            };

            sum_accept += tree.sum_accept;
            steps += tree.steps;
            divergent |= tree.divergent;

            if tree.keep_going && rng.random::<f64>() < (tree.weight / weight).min(1.0) {
                proposal = tree.proposal;
            }
            weight += tree.weight;

            if !tree.keep_going || !self.no_u_turn(&minus, &plus) {
                break;
            }
        }

        let accept_stat = if steps > 0 {
            sum_accept / steps as f64
        } else {
            0.0
        };
        (proposal, accept_stat, divergent)
    }

    /// Run warm-up and sampling from `initial`
    pub fn run(mut self, initial: Vec<f64>, rng: &mut StdRng, progress: &ProgressBar) -> ChainOutput {
        let warmup = self.settings.warmup;
        let mut current = Point::at(self.model, initial);

        self.find_reasonable_step(&current, rng);
        let mut adaptation = DualAveraging::new(self.step_size, self.settings.target_accept);

        // Metric window between a 15% initial and 10% terminal buffer
        let window_start = warmup * 15 / 100;
        let window_end = warmup - warmup / 10;
        let adapt_metric = warmup >= 20 && window_end > window_start;
        let mut window = VarianceWindow::new(self.model.dim());

        for iteration in 0..warmup {
            let (next, accept_stat, _) = self.transition(&current, rng);
            current = next;
            adaptation.update(accept_stat);
            self.step_size = adaptation.current();

            if adapt_metric && iteration >= window_start && iteration < window_end {
                window.push(&current.position);
                if iteration + 1 == window_end {
                    if let Some(variances) = window.regularized() {
                        self.inv_metric = variances;
                        self.find_reasonable_step(&current, rng);
                        adaptation = DualAveraging::new(self.step_size, self.settings.target_accept);
                    }
                }
            }
            progress.inc(1);
        }
        if warmup > 0 {
            self.step_size = adaptation.adapted();
        }

        let mut draws = Vec::with_capacity(self.settings.draws);
        let mut divergences = 0;
        let mut accept_total = 0.0;
        for _ in 0..self.settings.draws {
            let (next, accept_stat, divergent) = self.transition(&current, rng);
            current = next;
            accept_total += accept_stat;
            divergences += usize::from(divergent);
            draws.push(current.position.clone());
            progress.inc(1);
        }

        ChainOutput {
            mean_accept_stat: accept_total / self.settings.draws.max(1) as f64,
            draws,
            divergences,
            step_size: self.step_size,
        }
    }
}
