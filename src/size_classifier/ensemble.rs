//! Calibrated two-member voting ensemble.

use crate::calibration::{expected_calibration_error, TemperatureScaling};
use crate::classification::SoftmaxRegression;
use crate::config::ClassifierConfig;
use crate::dataset::SizeExample;
use crate::error::{Result, SizewiseError};
use crate::features::{design_matrix, FeatureRecord};
use crate::metrics::weighted_accuracy;
use crate::model_selection::{cross_val_accuracy, stratified_train_test_split, StratifiedKFold};
use crate::primitives::Matrix;
use crate::traits::{argmax, Classifier};
use crate::tree::RandomForestClassifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::SizeLadder;

/// Training metrics of one ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeModelMetrics {
    /// Registry name of the model
    pub name: String,
    /// Class labels in index order
    pub classes: Vec<String>,
    /// Rows per class
    pub class_counts: BTreeMap<String, usize>,
    /// Rows used to fit members
    pub n_train: usize,
    /// Rows held out for calibration
    pub n_calibration: usize,
    /// CV accuracy of the forest member
    pub forest_cv_accuracy: Option<f32>,
    /// CV accuracy of the softmax member
    pub softmax_cv_accuracy: Option<f32>,
    /// Normalized member weights `[forest, softmax]`
    pub member_weights: [f32; 2],
    /// Weighted accuracy on the calibration split
    pub holdout_accuracy: Option<f32>,
    /// Fitted temperature
    pub temperature: f32,
    /// Calibration error before temperature scaling
    pub ece_before: Option<f32>,
    /// Calibration error after temperature scaling
    pub ece_after: Option<f32>,
}

/// Forest + softmax regression, weighted by CV accuracy, then
/// temperature-calibrated on a stratified held-out split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeEnsemble {
    classes: Vec<String>,
    forest: RandomForestClassifier,
    softmax: SoftmaxRegression,
    member_weights: [f32; 2],
    calibration: TemperatureScaling,
    metrics: SizeModelMetrics,
}

impl SizeEnsemble {
    /// Trains an ensemble on `rows`.
    ///
    /// # Errors
    ///
    /// `InsufficientData` for fewer than `min_training_samples` rows or
    /// fewer than two classes; `Estimator` if neither member can be fit.
    pub fn train(name: &str, rows: &[&SizeExample], ladder: &SizeLadder, config: &ClassifierConfig) -> Result<Self> {
        if rows.len() < config.min_training_samples {
            return Err(SizewiseError::InsufficientData {
                context: name.to_string(),
                available: rows.len(),
                required: config.min_training_samples,
            });
        }

        let mut class_counts: BTreeMap<String, usize> = BTreeMap::new();
        for row in rows {
            *class_counts.entry(row.target.clone()).or_default() += 1;
        }
        let mut classes: Vec<String> = class_counts.keys().cloned().collect();
        classes.sort_by(|a, b| ladder.sort_key(a).cmp(&ladder.sort_key(b)));
        if classes.len() < 2 {
            return Err(SizewiseError::InsufficientData {
                context: format!("{name} classes"),
                available: classes.len(),
                required: 2,
            });
        }
        let n_classes = classes.len();

        let records: Vec<&FeatureRecord> = rows.iter().map(|r| &r.features).collect();
        let x = design_matrix(&records)?;
        let y: Vec<usize> = rows
            .iter()
            .map(|r| classes.iter().position(|c| *c == r.target).unwrap_or(0))
            .collect();
        let w: Vec<f32> = rows.iter().map(|r| r.final_weight()).collect();

        let (train_idx, cal_idx) = stratified_train_test_split(&y, config.calibration_fraction, config.random_state);
        let x_train = x.select_rows(&train_idx);
        let y_train: Vec<usize> = train_idx.iter().map(|&i| y[i]).collect();
        let w_train: Vec<f32> = train_idx.iter().map(|&i| w[i]).collect();

        let make_forest = || {
            RandomForestClassifier::new(config.forest_trees)
                .with_max_depth(config.forest_max_depth)
                .with_random_state(config.random_state)
        };
        let make_softmax = || SoftmaxRegression::new().with_max_iter(config.softmax_max_iter);

        let cv = StratifiedKFold::new(config.cv_folds, config.random_state);
        let forest_cv = member_cv("forest", || cross_val_accuracy(make_forest, &x_train, &y_train, n_classes, &w_train, &cv));
        let softmax_cv = member_cv("softmax", || cross_val_accuracy(make_softmax, &x_train, &y_train, n_classes, &w_train, &cv));

        let mut forest = make_forest();
        let forest_fit = forest.fit_weighted(&x_train, &y_train, n_classes, Some(&w_train));
        let mut softmax = make_softmax();
        let softmax_fit = softmax.fit_weighted(&x_train, &y_train, n_classes, Some(&w_train));

        let raw_weights = [
            if forest_fit.is_ok() { forest_cv.unwrap_or(0.0) } else { 0.0 },
            if softmax_fit.is_ok() { softmax_cv.unwrap_or(0.0) } else { 0.0 },
        ];
        let member_weights = match (forest_fit, softmax_fit) {
            (Err(a), Err(b)) => {
                return Err(SizewiseError::estimator(format!(
                    "{name}: no ensemble member could be fit (forest: {a}; softmax: {b})"
                )))
            }
            (Ok(()), Err(err)) => {
                tracing::warn!(model = name, error = %err, "softmax member failed, forest only");
                [1.0, 0.0]
            }
            (Err(err), Ok(())) => {
                tracing::warn!(model = name, error = %err, "forest member failed, softmax only");
                [0.0, 1.0]
            }
            (Ok(()), Ok(())) => normalize_weights(raw_weights),
        };

        let mut ensemble = Self {
            classes: classes.clone(),
            forest,
            softmax,
            member_weights,
            calibration: TemperatureScaling::new(),
            metrics: SizeModelMetrics {
                name: name.to_string(),
                classes,
                class_counts,
                n_train: train_idx.len(),
                n_calibration: cal_idx.len(),
                forest_cv_accuracy: forest_cv,
                softmax_cv_accuracy: softmax_cv,
                member_weights,
                holdout_accuracy: None,
                temperature: 1.0,
                ece_before: None,
                ece_after: None,
            },
        };

        if !cal_idx.is_empty() {
            let x_cal = x.select_rows(&cal_idx);
            let y_cal: Vec<usize> = cal_idx.iter().map(|&i| y[i]).collect();
            let w_cal: Vec<f32> = cal_idx.iter().map(|&i| w[i]).collect();
            let raw = ensemble.raw_proba(&x_cal)?;
            ensemble.calibration.fit(&raw, &y_cal, &w_cal);
            let calibrated: Vec<Vec<f32>> = raw.iter().map(|p| ensemble.calibration.calibrate(p)).collect();

            let predicted: Vec<usize> = calibrated.iter().map(|p| argmax(p)).collect();
            ensemble.metrics.holdout_accuracy = Some(weighted_accuracy(&predicted, &y_cal, &w_cal));
            ensemble.metrics.ece_before = Some(expected_calibration_error(&raw, &y_cal, 10));
            ensemble.metrics.ece_after = Some(expected_calibration_error(&calibrated, &y_cal, 10));
            ensemble.metrics.temperature = ensemble.calibration.temperature();
        }
        Ok(ensemble)
    }

    /// Class labels in index order.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Training metrics.
    #[must_use]
    pub fn metrics(&self) -> &SizeModelMetrics {
        &self.metrics
    }

    fn raw_proba(&self, x: &Matrix<f32>) -> Result<Vec<Vec<f32>>> {
        let n_classes = self.classes.len();
        let mut combined = vec![vec![0.0_f32; n_classes]; x.n_rows()];
        let members: [(&dyn Classifier, f32); 2] = [
            (&self.forest, self.member_weights[0]),
            (&self.softmax, self.member_weights[1]),
        ];
        for (member, weight) in members {
            if weight <= 0.0 {
                continue;
            }
            let proba = member.predict_proba(x)?;
            for (row, out) in combined.iter_mut().enumerate() {
                for (c, value) in out.iter_mut().enumerate() {
                    *value += weight * proba.get(row, c);
                }
            }
        }
        Ok(combined)
    }

    /// Calibrated class probabilities for one record.
    ///
    /// # Errors
    ///
    /// `Estimator` if the record does not match the training schema.
    pub fn predict_proba(&self, features: &FeatureRecord) -> Result<Vec<f32>> {
        let x = design_matrix(&[features])?;
        let raw = self
            .raw_proba(&x)?
            .into_iter()
            .next()
            .ok_or_else(|| SizewiseError::estimator("empty prediction"))?;
        Ok(self.calibration.calibrate(&raw))
    }
}

fn member_cv(member: &str, run: impl FnOnce() -> Result<crate::model_selection::CrossValidationResult>) -> Option<f32> {
    match run() {
        Ok(result) => Some(result.mean()),
        Err(err) => {
            tracing::debug!(member, error = %err, "member cross-validation failed");
            None
        }
    }
}

fn normalize_weights(raw: [f32; 2]) -> [f32; 2] {
    let total = raw[0] + raw[1];
    if total > 0.0 {
        [raw[0] / total, raw[1] / total]
    } else {
        [0.5, 0.5]
    }
}
