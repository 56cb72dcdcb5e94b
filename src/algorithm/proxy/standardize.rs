//! Column-wise centring and scaling
//!
//! Uses the population standard deviation (ddof 0). Constant columns keep a
//! scale of 1 so they map to zero instead of NaN.

use crate::error::{Result, SynthesisError};

/// Fitted column means and scales
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl Standardizer {
    /// Fit on a row-major matrix
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(SynthesisError::insufficient("standardization", "no rows"));
        };
        let width = first.len();
        if rows.iter().any(|r| r.len() != width) {
            return Err(SynthesisError::Validation(
                "rows of the feature matrix differ in length".to_string(),
            ));
        }

        let n = rows.len() as f64;
        let mut means = vec![0.0; width];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut means {
            *m /= n;
        }
        let mut scales = vec![0.0; width];
        for row in rows {
            for ((s, v), m) in scales.iter_mut().zip(row).zip(&means) {
                *s += (v - m).powi(2) / n;
            }
        }
        for (s, m) in scales.iter_mut().zip(&means) {
            *s = s.sqrt();
            if *s <= 1e-12 * m.abs().max(1.0) {
                *s = 1.0;
            }
        }
        Ok(Self { means, scales })
    }

    #[must_use]
    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .zip(self.means.iter().zip(&self.scales))
                    .map(|(v, (m, s))| (v - m) / s)
                    .collect()
            })
            .collect()
    }

    #[must_use]
    pub fn inverse_transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .zip(self.means.iter().zip(&self.scales))
                    .map(|(z, (m, s))| z * s + m)
                    .collect()
            })
            .collect()
    }

    /// Fit and transform in one step
    pub fn fit_transform(rows: &[Vec<f64>]) -> Result<(Self, Vec<Vec<f64>>)> {
        let scaler = Self::fit(rows)?;
        let scaled = scaler.transform(rows);
        Ok((scaler, scaled))
    }
}
