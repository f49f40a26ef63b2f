//! Core traits for the estimators behind the regression bank and the size classifier.
//!
//! Every estimator accepts optional per-sample weights because training rows
//! carry provenance, feedback and recency weights.

use crate::error::Result;
use crate::primitives::{Matrix, Vector};

/// Supervised regressor.
///
/// # Examples
///
/// ```
/// use sizewise::prelude::*;
///
/// // y = 2x + 1
/// let x = Matrix::from_vec(4, 1, vec![1.0, 2.0, 3.0, 4.0]).expect("4x1");
/// let y = Vector::from_slice(&[3.0, 5.0, 7.0, 9.0]);
///
/// let mut model = LinearRegression::new();
/// model.fit(&x, &y).expect("well-conditioned");
/// let score = model.score(&x, &y).expect("fitted");
/// assert!(score > 0.99);
/// ```
pub trait Estimator {
    /// Fits the model with per-sample weights (`None` means uniform).
    ///
    /// # Errors
    ///
    /// Returns an error if fitting fails (dimension mismatch, singular matrix, etc.).
    fn fit_weighted(
        &mut self,
        x: &Matrix<f32>,
        y: &Vector<f32>,
        sample_weight: Option<&[f32]>,
    ) -> Result<()>;

    /// Predicts target values for input data.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is unfitted or the feature count differs.
    fn predict(&self, x: &Matrix<f32>) -> Result<Vector<f32>>;

    /// Fits with uniform weights.
    ///
    /// # Errors
    ///
    /// Same as [`Estimator::fit_weighted`].
    fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
        self.fit_weighted(x, y, None)
    }

    /// Coefficient of determination on `(x, y)`.
    ///
    /// # Errors
    ///
    /// Same as [`Estimator::predict`].
    fn score(&self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<f32> {
        let predictions = self.predict(x)?;
        Ok(crate::metrics::r_squared(&predictions, y))
    }
}

/// Multi-class classifier producing per-class probabilities.
///
/// Labels are dense class indices in `0..n_classes`.
pub trait Classifier {
    /// Fits the model.
    ///
    /// # Errors
    ///
    /// Returns an error on empty input, label/row mismatch, or labels outside `0..n_classes`.
    fn fit_weighted(
        &mut self,
        x: &Matrix<f32>,
        y: &[usize],
        n_classes: usize,
        sample_weight: Option<&[f32]>,
    ) -> Result<()>;

    /// Returns an `n_samples × n_classes` probability matrix whose rows sum to 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is unfitted or the feature count differs.
    fn predict_proba(&self, x: &Matrix<f32>) -> Result<Matrix<f32>>;

    /// Arg-max class per row.
    ///
    /// # Errors
    ///
    /// Same as [`Classifier::predict_proba`].
    fn predict(&self, x: &Matrix<f32>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok((0..proba.n_rows())
            .map(|row| argmax(proba.row_slice(row)))
            .collect())
    }

    /// Accuracy on `(x, y)`.
    ///
    /// # Errors
    ///
    /// Same as [`Classifier::predict_proba`].
    fn score(&self, x: &Matrix<f32>, y: &[usize]) -> Result<f32> {
        let predicted = self.predict(x)?;
        Ok(crate::metrics::accuracy(&predicted, y))
    }
}

/// Trait for data transformers (scalers).
pub trait Transformer {
    /// Fits the transformer to data.
    ///
    /// # Errors
    ///
    /// Returns an error if fitting fails.
    fn fit(&mut self, x: &Matrix<f32>) -> Result<()>;

    /// Transforms data using fitted parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if transformer is not fitted.
    fn transform(&self, x: &Matrix<f32>) -> Result<Matrix<f32>>;

    /// Fits and transforms in one step.
    ///
    /// # Errors
    ///
    /// Returns an error if fitting fails.
    fn fit_transform(&mut self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// Index of the largest value; ties resolve to the lowest index.
pub(crate) fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Validates sample weights against a row count, expanding `None` to ones.
pub(crate) fn resolve_weights(sample_weight: Option<&[f32]>, n_samples: usize) -> Result<Vec<f32>> {
    match sample_weight {
        None => Ok(vec![1.0; n_samples]),
        Some(w) if w.len() != n_samples => Err(crate::error::SizewiseError::estimator(format!(
            "sample_weight has {} entries for {} samples",
            w.len(),
            n_samples
        ))),
        Some(w) if w.iter().any(|v| !v.is_finite() || *v < 0.0) => {
            Err("sample weights must be finite and non-negative".into())
        }
        Some(w) if w.iter().sum::<f32>() <= 0.0 => Err("sample weights sum to zero".into()),
        Some(w) => Ok(w.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_ties_take_first() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), 1);
        assert_eq!(argmax(&[0.9]), 0);
    }

    #[test]
    fn test_resolve_weights_defaults_to_ones() {
        let w = resolve_weights(None, 3).expect("no weights");
        assert_eq!(w, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_resolve_weights_rejects_bad_input() {
        assert!(resolve_weights(Some(&[1.0, 2.0]), 3).is_err());
        assert!(resolve_weights(Some(&[1.0, -2.0]), 2).is_err());
        assert!(resolve_weights(Some(&[0.0, 0.0]), 2).is_err());
        assert!(resolve_weights(Some(&[f32::NAN, 1.0]), 2).is_err());
    }
}
