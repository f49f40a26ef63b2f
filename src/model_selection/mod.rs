//! Model selection utilities for cross-validation and train/test splitting.
//!
//! This module provides tools for:
//! - K-Fold and stratified K-Fold cross-validation
//! - Stratified train/calibration splitting
//! - Fold-wise scoring of weighted estimators

use crate::error::Result;
use crate::primitives::{Matrix, Vector};
use crate::traits::{Classifier, Estimator};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// Results from cross-validation.
#[derive(Debug, Clone)]
pub struct CrossValidationResult {
    /// Score for each fold
    pub scores: Vec<f32>,
}

impl CrossValidationResult {
    /// Calculate mean score across folds
    #[must_use]
    pub fn mean(&self) -> f32 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().sum::<f32>() / self.scores.len() as f32
    }

    /// Calculate standard deviation of scores
    #[must_use]
    pub fn std(&self) -> f32 {
        if self.scores.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .scores
            .iter()
            .map(|&score| (score - mean).powi(2))
            .sum::<f32>()
            / self.scores.len() as f32;
        variance.sqrt()
    }
}

/// K-Fold cross-validator.
#[derive(Debug, Clone)]
pub struct KFold {
    n_splits: usize,
    shuffle: bool,
    random_state: Option<u64>,
}

impl KFold {
    /// Create a new K-Fold cross-validator.
    ///
    /// `n_splits` must be at least 2.
    #[must_use]
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: false,
            random_state: None,
        }
    }

    /// Set random state for reproducible shuffling.
    #[must_use]
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self.shuffle = true; // Shuffle is implied when random_state is set
        self
    }

    /// Number of folds.
    #[must_use]
    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Generate train/test indices for each fold.
    ///
    /// Returns a vector of (train_indices, test_indices) tuples.
    #[must_use]
    pub fn split(&self, n_samples: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
        let mut indices: Vec<usize> = (0..n_samples).collect();

        if self.shuffle {
            let mut rng = rand::rngs::StdRng::seed_from_u64(self.random_state.unwrap_or(0));
            indices.shuffle(&mut rng);
        }

        let fold_size = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;

        let mut result = Vec::with_capacity(self.n_splits);
        let mut start = 0;

        for i in 0..self.n_splits {
            // Distribute remainder across first folds
            let current_fold_size = if i < remainder {
                fold_size + 1
            } else {
                fold_size
            };
            let end = start + current_fold_size;

            let test_indices = indices[start..end].to_vec();
            let mut train_indices = Vec::with_capacity(n_samples - current_fold_size);
            train_indices.extend_from_slice(&indices[..start]);
            train_indices.extend_from_slice(&indices[end..]);

            result.push((train_indices, test_indices));
            start = end;
        }

        result
    }
}

/// Stratified K-Fold cross-validator over dense class labels.
///
/// Each class is dealt across folds separately so every fold keeps roughly
/// the corpus class distribution.
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
    random_state: u64,
}

impl StratifiedKFold {
    /// Create a shuffled stratified splitter.
    #[must_use]
    pub fn new(n_splits: usize, random_state: u64) -> Self {
        Self {
            n_splits,
            random_state,
        }
    }

    /// Generate stratified train/test indices for each fold.
    ///
    /// Folds whose test side ends up empty are dropped.
    #[must_use]
    pub fn split(&self, y: &[usize]) -> Vec<(Vec<usize>, Vec<usize>)> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(self.random_state);
        let mut fold_indices: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];

        // Offset keeps small classes from all landing in fold 0.
        let mut offset = 0;
        for mut indices in group_by_label(y).into_values() {
            indices.shuffle(&mut rng);
            for (pos, idx) in indices.into_iter().enumerate() {
                fold_indices[(pos + offset) % self.n_splits].push(idx);
            }
            offset += 1;
        }

        (0..self.n_splits)
            .filter(|&i| !fold_indices[i].is_empty())
            .map(|i| {
                let test = fold_indices[i].clone();
                let train: Vec<usize> = fold_indices
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .flat_map(|(_, fold)| fold.iter().copied())
                    .collect();
                (train, test)
            })
            .filter(|(train, _)| !train.is_empty())
            .collect()
    }
}

/// Splits indices into (train, held-out) preserving per-class proportions.
///
/// Each class contributes `round(n_c * test_fraction)` rows to the held-out
/// side, but always keeps at least one row on the train side. Singleton
/// classes stay entirely in train.
#[must_use]
pub fn stratified_train_test_split(
    y: &[usize],
    test_fraction: f32,
    random_state: u64,
) -> (Vec<usize>, Vec<usize>) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(random_state);
    let mut train = Vec::with_capacity(y.len());
    let mut test = Vec::new();

    for mut indices in group_by_label(y).into_values() {
        indices.shuffle(&mut rng);
        let n = indices.len();
        let n_test = ((n as f32 * test_fraction).round() as usize).min(n.saturating_sub(1));
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

fn group_by_label(y: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        groups.entry(label).or_default().push(i);
    }
    groups
}

/// Cross-validated mean squared error of a weighted regressor.
///
/// `make` builds a fresh unfitted estimator per fold. Validation MSE is
/// unweighted so candidates are compared on the same footing.
///
/// # Errors
///
/// Returns the first fold's fitting or prediction error.
pub fn cross_val_mse<E, F>(
    make: F,
    x: &Matrix<f32>,
    y: &Vector<f32>,
    sample_weight: &[f32],
    cv: &KFold,
) -> Result<CrossValidationResult>
where
    E: Estimator,
    F: Fn() -> E,
{
    let mut scores = Vec::with_capacity(cv.n_splits());
    for (train_idx, test_idx) in cv.split(x.n_rows()) {
        if train_idx.is_empty() || test_idx.is_empty() {
            continue;
        }
        let mut model = make();
        let x_train = x.select_rows(&train_idx);
        let y_train = y.select(&train_idx);
        let w_train: Vec<f32> = train_idx.iter().map(|&i| sample_weight[i]).collect();
        model.fit_weighted(&x_train, &y_train, Some(&w_train))?;

        let predictions = model.predict(&x.select_rows(&test_idx))?;
        scores.push(crate::metrics::mse(&predictions, &y.select(&test_idx)));
    }
    if scores.is_empty() {
        return Err("no usable folds".into());
    }
    Ok(CrossValidationResult { scores })
}

/// Cross-validated accuracy of a weighted classifier over stratified folds.
///
/// # Errors
///
/// Returns the first fold's fitting or prediction error.
pub fn cross_val_accuracy<C, F>(
    make: F,
    x: &Matrix<f32>,
    y: &[usize],
    n_classes: usize,
    sample_weight: &[f32],
    cv: &StratifiedKFold,
) -> Result<CrossValidationResult>
where
    C: Classifier,
    F: Fn() -> C,
{
    let mut scores = Vec::new();
    for (train_idx, test_idx) in cv.split(y) {
        let mut model = make();
        let y_train: Vec<usize> = train_idx.iter().map(|&i| y[i]).collect();
        let w_train: Vec<f32> = train_idx.iter().map(|&i| sample_weight[i]).collect();
        model.fit_weighted(&x.select_rows(&train_idx), &y_train, n_classes, Some(&w_train))?;

        let y_test: Vec<usize> = test_idx.iter().map(|&i| y[i]).collect();
        scores.push(model.score(&x.select_rows(&test_idx), &y_test)?);
    }
    if scores.is_empty() {
        return Err("no usable folds".into());
    }
    Ok(CrossValidationResult { scores })
}
