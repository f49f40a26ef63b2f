//! Classification metrics for evaluating classifier performance.

/// Compute classification accuracy.
///
/// accuracy = `correct_predictions` / `total_predictions`
///
/// # Panics
///
/// Panics if vectors have different lengths or are empty.
///
/// # Examples
///
/// ```
/// use sizewise::metrics::classification::accuracy;
///
/// let y_true = vec![0, 1, 2, 0, 1, 2];
/// let y_pred = vec![0, 2, 1, 0, 0, 1];
/// let acc = accuracy(&y_pred, &y_true);
/// assert!((acc - 0.333333).abs() < 0.001);
/// ```
#[must_use]
pub fn accuracy(y_pred: &[usize], y_true: &[usize]) -> f32 {
    assert_eq!(y_pred.len(), y_true.len(), "Vectors must have same length");
    assert!(!y_true.is_empty(), "Vectors cannot be empty");

    let correct = y_pred
        .iter()
        .zip(y_true.iter())
        .filter(|(p, t)| p == t)
        .count();

    correct as f32 / y_true.len() as f32
}

/// Accuracy where each row counts with its sample weight.
///
/// Returns 0.0 when the weights sum to zero.
///
/// # Panics
///
/// Panics if lengths differ.
#[must_use]
pub fn weighted_accuracy(y_pred: &[usize], y_true: &[usize], weights: &[f32]) -> f32 {
    assert_eq!(y_pred.len(), y_true.len(), "Vectors must have same length");
    assert_eq!(weights.len(), y_true.len(), "Weights must match labels");

    let total: f32 = weights.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let correct: f32 = y_pred
        .iter()
        .zip(y_true)
        .zip(weights)
        .filter(|((p, t), _)| p == t)
        .map(|(_, w)| w)
        .sum();
    correct / total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_accuracy_respects_weights() {
        let y_true = [0, 1];
        let y_pred = [0, 0];
        assert!((weighted_accuracy(&y_pred, &y_true, &[3.0, 1.0]) - 0.75).abs() < 1e-6);
        assert_eq!(weighted_accuracy(&y_pred, &y_true, &[0.0, 0.0]), 0.0);
    }
}
