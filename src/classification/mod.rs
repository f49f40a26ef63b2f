//! Linear classification.
//!
//! [`SoftmaxRegression`] is the multinomial generalization of logistic
//! regression, trained by full-batch gradient descent on standardized
//! features with an L2 penalty.

use crate::error::{Result, SizewiseError};
use crate::preprocessing::StandardScaler;
use crate::primitives::Matrix;
use crate::traits::{resolve_weights, Classifier, Transformer};
use serde::{Deserialize, Serialize};

/// Multinomial logistic regression.
///
/// # Examples
///
/// ```
/// use sizewise::classification::SoftmaxRegression;
/// use sizewise::prelude::*;
///
/// let x = Matrix::from_vec(6, 1, vec![0.0, 0.5, 1.0, 5.0, 5.5, 6.0]).expect("6x1");
/// let y = vec![0, 0, 0, 1, 1, 1];
///
/// let mut model = SoftmaxRegression::new();
/// model.fit_weighted(&x, &y, 2, None).expect("fit");
/// assert_eq!(model.predict(&x).expect("fitted"), y);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftmaxRegression {
    learning_rate: f32,
    max_iter: usize,
    l2: f32,
    tol: f32,
    scaler: StandardScaler,
    /// `n_classes × (n_features + 1)`, bias in the last column.
    weights: Option<Matrix<f32>>,
    n_classes: usize,
}

impl Default for SoftmaxRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftmaxRegression {
    /// Creates a model with learning rate 0.5, 500 iterations and L2 = 1e-3.
    #[must_use]
    pub fn new() -> Self {
        Self {
            learning_rate: 0.5,
            max_iter: 500,
            l2: 1e-3,
            tol: 1e-6,
            scaler: StandardScaler::new(),
            weights: None,
            n_classes: 0,
        }
    }

    /// Sets the gradient descent step size.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Sets the maximum number of gradient steps.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Sets the L2 penalty on non-bias weights.
    #[must_use]
    pub fn with_l2(mut self, l2: f32) -> Self {
        self.l2 = l2;
        self
    }

    fn scores(weights: &Matrix<f32>, row: &[f32], out: &mut [f32]) {
        let n_features = row.len();
        for (class, score) in out.iter_mut().enumerate() {
            let w = weights.row_slice(class);
            *score = w[n_features] + w[..n_features].iter().zip(row).map(|(a, b)| a * b).sum::<f32>();
        }
        softmax_in_place(out);
    }
}

/// Numerically stable softmax.
pub(crate) fn softmax_in_place(values: &mut [f32]) {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        for v in values.iter_mut() {
            *v /= sum;
        }
    }
}

impl Classifier for SoftmaxRegression {
    fn fit_weighted(
        &mut self,
        x: &Matrix<f32>,
        y: &[usize],
        n_classes: usize,
        sample_weight: Option<&[f32]>,
    ) -> Result<()> {
        let (n_samples, n_features) = x.shape();
        if n_samples == 0 {
            return Err("Cannot fit with zero samples".into());
        }
        if y.len() != n_samples {
            return Err("Number of samples in X and y must match".into());
        }
        if n_classes == 0 || y.iter().any(|&label| label >= n_classes) {
            return Err("labels must lie in 0..n_classes".into());
        }
        let w = resolve_weights(sample_weight, n_samples)?;
        let w_sum: f32 = w.iter().sum();

        let mut scaler = StandardScaler::new();
        let xs = scaler.fit_transform(x)?;

        let stride = n_features + 1;
        let mut weights = Matrix::zeros(n_classes, stride);
        let mut proba = vec![0.0_f32; n_classes];
        let mut grad = vec![0.0_f32; n_classes * stride];

        for _ in 0..self.max_iter {
            grad.iter_mut().for_each(|g| *g = 0.0);
            for i in 0..n_samples {
                let row = xs.row_slice(i);
                Self::scores(&weights, row, &mut proba);
                for class in 0..n_classes {
                    let target = if y[i] == class { 1.0 } else { 0.0 };
                    let err = w[i] * (proba[class] - target);
                    let g = &mut grad[class * stride..(class + 1) * stride];
                    for (gj, xj) in g.iter_mut().zip(row) {
                        *gj += err * xj;
                    }
                    g[n_features] += err;
                }
            }

            let mut max_step = 0.0_f32;
            for class in 0..n_classes {
                for j in 0..stride {
                    let current = weights.get(class, j);
                    let penalty = if j < n_features { self.l2 * current } else { 0.0 };
                    let step = self.learning_rate * (grad[class * stride + j] / w_sum + penalty);
                    weights.set(class, j, current - step);
                    max_step = max_step.max(step.abs());
                }
            }
            if max_step < self.tol {
                break;
            }
        }

        if weights.as_slice().iter().any(|v| !v.is_finite()) {
            return Err("softmax regression diverged".into());
        }
        self.scaler = scaler;
        self.weights = Some(weights);
        self.n_classes = n_classes;
        Ok(())
    }

    fn predict_proba(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        let weights = self
            .weights
            .as_ref()
            .ok_or_else(|| SizewiseError::from("Model not fitted. Call fit() first."))?;
        let mut data = Vec::with_capacity(x.n_rows() * self.n_classes);
        let mut proba = vec![0.0_f32; self.n_classes];
        for row in 0..x.n_rows() {
            let scaled = self.scaler.transform_row(x.row_slice(row))?;
            Self::scores(weights, &scaled, &mut proba);
            data.extend_from_slice(&proba);
        }
        Matrix::from_vec(x.n_rows(), self.n_classes, data).map_err(Into::into)
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
