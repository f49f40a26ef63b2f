//! Feature scaling applied before the linear and softmax estimators.

use crate::error::{Result, SizewiseError};
use crate::primitives::Matrix;
use crate::traits::Transformer;
use serde::{Deserialize, Serialize};

/// Standardizes features by removing the mean and scaling to unit variance.
///
/// Uses the population standard deviation. Columns whose standard deviation
/// is at or below `1e-10` are centered but left unscaled, so a constant
/// column (e.g. the gender flag inside a single-gender corpus) maps to zeros.
///
/// # Examples
///
/// ```
/// use sizewise::preprocessing::StandardScaler;
/// use sizewise::primitives::Matrix;
/// use sizewise::traits::Transformer;
///
/// let x = Matrix::from_vec(3, 1, vec![1.0, 2.0, 3.0]).expect("3x1");
/// let mut scaler = StandardScaler::new();
/// let scaled = scaler.fit_transform(&x).expect("non-empty");
/// assert!(scaled.get(1, 0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Option<Vec<f32>>,
    std: Option<Vec<f32>>,
}

impl StandardScaler {
    /// Creates an unfitted scaler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the mean of each feature, if fitted.
    #[must_use]
    pub fn mean(&self) -> Option<&[f32]> {
        self.mean.as_deref()
    }

    /// Returns the standard deviation of each feature, if fitted.
    #[must_use]
    pub fn std(&self) -> Option<&[f32]> {
        self.std.as_deref()
    }

    /// Returns true if the scaler has been fitted.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.mean.is_some()
    }

    /// Scales a single feature row.
    ///
    /// # Errors
    ///
    /// Returns an error if the scaler is not fitted or the row length differs.
    pub fn transform_row(&self, row: &[f32]) -> Result<Vec<f32>> {
        let (mean, std) = self.params()?;
        if row.len() != mean.len() {
            return Err(SizewiseError::estimator(format!(
                "expected {} features, got {}",
                mean.len(),
                row.len()
            )));
        }
        Ok(row
            .iter()
            .zip(mean.iter().zip(std))
            .map(|(&v, (&m, &s))| if s > 1e-10 { (v - m) / s } else { v - m })
            .collect())
    }

    fn params(&self) -> Result<(&[f32], &[f32])> {
        match (&self.mean, &self.std) {
            (Some(mean), Some(std)) => Ok((mean, std)),
            _ => Err("Scaler not fitted".into()),
        }
    }
}

impl Transformer for StandardScaler {
    fn fit(&mut self, x: &Matrix<f32>) -> Result<()> {
        let (n_samples, n_features) = x.shape();
        if n_samples == 0 {
            return Err("Cannot fit with zero samples".into());
        }

        let mut mean = vec![0.0_f32; n_features];
        for row in 0..n_samples {
            for (j, m) in mean.iter_mut().enumerate() {
                *m += x.get(row, j);
            }
        }
        for m in &mut mean {
            *m /= n_samples as f32;
        }

        let mut std = vec![0.0_f32; n_features];
        for row in 0..n_samples {
            for (j, s) in std.iter_mut().enumerate() {
                let d = x.get(row, j) - mean[j];
                *s += d * d;
            }
        }
        for s in &mut std {
            *s = (*s / n_samples as f32).sqrt();
        }

        self.mean = Some(mean);
        self.std = Some(std);
        Ok(())
    }

    fn transform(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        let (n_samples, n_features) = x.shape();
        let mut data = Vec::with_capacity(n_samples * n_features);
        for row in 0..n_samples {
            data.extend(self.transform_row(x.row_slice(row))?);
        }
        Matrix::from_vec(n_samples, n_features, data).map_err(Into::into)
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
