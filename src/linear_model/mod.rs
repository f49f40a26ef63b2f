//! Linear models for regression.
//!
//! Both estimators solve weighted normal equations on weighted-centered
//! data via Cholesky decomposition and recover the intercept from the
//! weighted means. Zero-variance columns are held at a zero coefficient
//! instead of making the system singular.

use crate::error::{Result, SizewiseError};
use crate::primitives::{Matrix, Vector};
use crate::traits::{resolve_weights, Estimator};
use serde::{Deserialize, Serialize};

/// Ordinary least squares linear regression.
///
/// # Examples
///
/// ```
/// use sizewise::prelude::*;
///
/// let x = Matrix::from_vec(4, 1, vec![1.0, 2.0, 3.0, 4.0]).expect("4x1");
/// let y = Vector::from_slice(&[3.0, 5.0, 7.0, 9.0]);
///
/// let mut model = LinearRegression::new();
/// model.fit(&x, &y).expect("well-conditioned");
/// assert!((model.intercept() - 1.0).abs() < 1e-3);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearRegression {
    coefficients: Option<Vector<f32>>,
    intercept: f32,
}

impl LinearRegression {
    /// Creates a new unfitted model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the fitted coefficients, if any.
    #[must_use]
    pub fn coefficients(&self) -> Option<&Vector<f32>> {
        self.coefficients.as_ref()
    }

    /// Returns the intercept term.
    #[must_use]
    pub fn intercept(&self) -> f32 {
        self.intercept
    }

    /// Returns true if the model has been fitted.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }
}

impl Estimator for LinearRegression {
    fn fit_weighted(
        &mut self,
        x: &Matrix<f32>,
        y: &Vector<f32>,
        sample_weight: Option<&[f32]>,
    ) -> Result<()> {
        let (coefficients, intercept) = solve_weighted(x, y, sample_weight, 0.0)?;
        self.coefficients = Some(coefficients);
        self.intercept = intercept;
        Ok(())
    }

    fn predict(&self, x: &Matrix<f32>) -> Result<Vector<f32>> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| SizewiseError::from("Model not fitted. Call fit() first."))?;
        predict_linear(x, coefficients, self.intercept)
    }
}

/// Ridge regression (L2-regularized least squares).
///
/// The intercept is not penalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ridge {
    alpha: f32,
    coefficients: Option<Vector<f32>>,
    intercept: f32,
}

impl Ridge {
    /// Creates a new Ridge model with regularization strength `alpha`.
    #[must_use]
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha,
            coefficients: None,
            intercept: 0.0,
        }
    }

    /// Regularization strength.
    #[must_use]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Returns the fitted coefficients, if any.
    #[must_use]
    pub fn coefficients(&self) -> Option<&Vector<f32>> {
        self.coefficients.as_ref()
    }

    /// Returns the intercept term.
    #[must_use]
    pub fn intercept(&self) -> f32 {
        self.intercept
    }
}

impl Default for Ridge {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Estimator for Ridge {
    fn fit_weighted(
        &mut self,
        x: &Matrix<f32>,
        y: &Vector<f32>,
        sample_weight: Option<&[f32]>,
    ) -> Result<()> {
        if self.alpha < 0.0 || !self.alpha.is_finite() {
            return Err("Ridge alpha must be finite and non-negative".into());
        }
        let (coefficients, intercept) = solve_weighted(x, y, sample_weight, self.alpha)?;
        self.coefficients = Some(coefficients);
        self.intercept = intercept;
        Ok(())
    }

    fn predict(&self, x: &Matrix<f32>) -> Result<Vector<f32>> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| SizewiseError::from("Model not fitted. Call fit() first."))?;
        predict_linear(x, coefficients, self.intercept)
    }
}

fn predict_linear(x: &Matrix<f32>, coefficients: &Vector<f32>, intercept: f32) -> Result<Vector<f32>> {
    let raw = x.matvec(coefficients)?;
    Ok(Vector::from_vec(
        raw.as_slice().iter().map(|v| v + intercept).collect(),
    ))
}

/// Solves `(Xcᵀ W Xc + αI) β = Xcᵀ W yc` over non-constant columns.
fn solve_weighted(
    x: &Matrix<f32>,
    y: &Vector<f32>,
    sample_weight: Option<&[f32]>,
    alpha: f32,
) -> Result<(Vector<f32>, f32)> {
    let (n_samples, n_features) = x.shape();
    if n_samples != y.len() {
        return Err("Number of samples must match target length".into());
    }
    if n_samples == 0 {
        return Err("Cannot fit with zero samples".into());
    }
    let w = resolve_weights(sample_weight, n_samples)?;
    let w_sum: f32 = w.iter().sum();

    let mut x_mean = vec![0.0_f32; n_features];
    let mut y_mean = 0.0_f32;
    for i in 0..n_samples {
        for (j, m) in x_mean.iter_mut().enumerate() {
            *m += w[i] * x.get(i, j);
        }
        y_mean += w[i] * y[i];
    }
    for m in &mut x_mean {
        *m /= w_sum;
    }
    y_mean /= w_sum;

    let active: Vec<usize> = (0..n_features)
        .filter(|&j| {
            let var: f32 = (0..n_samples)
                .map(|i| w[i] * (x.get(i, j) - x_mean[j]).powi(2))
                .sum::<f32>()
                / w_sum;
            var > 1e-10
        })
        .collect();

    if alpha == 0.0 && n_samples < active.len() + 1 {
        return Err(SizewiseError::InsufficientData {
            context: "least squares".to_string(),
            available: n_samples,
            required: active.len() + 1,
        });
    }

    let mut coefficients = vec![0.0_f32; n_features];
    if !active.is_empty() {
        let k = active.len();
        let mut gram = Matrix::zeros(k, k);
        let mut rhs = vec![0.0_f32; k];
        for i in 0..n_samples {
            let yc = y[i] - y_mean;
            for (a, &ja) in active.iter().enumerate() {
                let xa = x.get(i, ja) - x_mean[ja];
                rhs[a] += w[i] * xa * yc;
                for (b, &jb) in active.iter().enumerate().skip(a) {
                    let xb = x.get(i, jb) - x_mean[jb];
                    let updated = gram.get(a, b) + w[i] * xa * xb;
                    gram.set(a, b, updated);
                }
            }
        }
        for a in 0..k {
            for b in 0..a {
                let mirrored = gram.get(b, a);
                gram.set(a, b, mirrored);
            }
        }
        gram.add_to_diagonal(alpha);

        let beta = gram.cholesky_solve(&Vector::from_vec(rhs))?;
        for (a, &j) in active.iter().enumerate() {
            coefficients[j] = beta[a];
        }
    }

    let intercept = y_mean
        - coefficients
            .iter()
            .zip(&x_mean)
            .map(|(c, m)| c * m)
            .sum::<f32>();

    if coefficients.iter().any(|c| !c.is_finite()) || !intercept.is_finite() {
        return Err("least squares produced non-finite coefficients".into());
    }
    Ok((Vector::from_vec(coefficients), intercept))
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
