//! Missing-value policies for the proxy feature matrix

use crate::models::feature::FEATURE_COUNT;

/// A feature row before imputation; `None` marks a missing value
pub type PartialRow = [Option<f64>; FEATURE_COUNT];

/// Fills every missing value of a state x feature matrix
pub trait ImputationPolicy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Return a fully numeric copy of `rows`
    fn impute(&self, rows: &[PartialRow]) -> Vec<[f64; FEATURE_COUNT]>;
}

/// Column mean across states, then zero for columns with no values at all
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanThenZero;

impl MeanThenZero {
    /// Mean of the present values of each column
    #[must_use]
    pub fn column_means(rows: &[PartialRow]) -> [Option<f64>; FEATURE_COUNT] {
        let mut means = [None; FEATURE_COUNT];
        for (col, mean) in means.iter_mut().enumerate() {
            let present: Vec<f64> = rows.iter().filter_map(|row| row[col]).collect();
            if !present.is_empty() {
                *mean = Some(present.iter().sum::<f64>() / present.len() as f64);
            }
        }
        means
    }
}

impl ImputationPolicy for MeanThenZero {
    fn name(&self) -> &str {
        "mean_then_zero"
    }

    fn impute(&self, rows: &[PartialRow]) -> Vec<[f64; FEATURE_COUNT]> {
        let means = Self::column_means(rows);
        rows.iter()
            .map(|row| {
                let mut filled = [0.0; FEATURE_COUNT];
                for col in 0..FEATURE_COUNT {
                    filled[col] = row[col].or(means[col]).unwrap_or(0.0);
                }
                filled
            })
            .collect()
    }
}

/// Replace every missing value with one constant
#[derive(Debug, Clone, Copy)]
pub struct ConstantFill(pub f64);

impl ImputationPolicy for ConstantFill {
    fn name(&self) -> &str {
        "constant"
    }

    fn impute(&self, rows: &[PartialRow]) -> Vec<[f64; FEATURE_COUNT]> {
        rows.iter().map(|row| row.map(|v| v.unwrap_or(self.0))).collect()
    }
}
