//! Per-(garment, measure) measurement regressors.
//!
//! Each pair with enough rows gets its own model, chosen by k-fold CV
//! mean squared error among the [`CandidateModel`]s and refit on every row
//! of the pair with sample weights. Pairs are independent and train on the
//! rayon pool.
//!
//! # Example
//!
//! ```
//! use sizewise::config::RegressionConfig;
//! use sizewise::regression_bank::RegressionBank;
//!
//! let bank = RegressionBank::new(RegressionConfig::default());
//! assert!(bank.is_empty());
//! assert!((bank.confidence_for_rmse(5.0) - 0.9).abs() < 1e-6);
//! ```

mod candidate;

pub use candidate::{CandidateModel, FittedRegressor, ScaledRegressor};

use crate::config::RegressionConfig;
use crate::dataset::MeasurementExample;
use crate::error::{Result, SizewiseError};
use crate::features::{design_matrix, FeatureRecord, FeatureSchema};
use crate::model_selection::{cross_val_mse, KFold};
use crate::primitives::Vector;
use crate::profile::Profile;
use crate::traits::Estimator;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key of one regressor: `garment/measure`.
#[must_use]
pub fn model_key(garment: &str, measure: &str) -> String {
    format!("{garment}/{measure}")
}

/// CV result of one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    /// Candidate
    pub candidate: CandidateModel,
    /// Mean CV MSE, if evaluation succeeded
    pub cv_mse: Option<f32>,
    /// Failure reason otherwise
    pub error: Option<String>,
}

/// Metrics of a trained pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementModelMetrics {
    /// Garment code
    pub garment: String,
    /// Garment measure name
    pub measure: String,
    /// Winning candidate
    pub model_type: CandidateModel,
    /// Winning candidate's CV RMSE
    pub rmse: f32,
    /// Winning candidate's CV MSE
    pub cv_mse: f32,
    /// Rows used
    pub n_samples: usize,
    /// Folds used
    pub n_folds: usize,
    /// Every candidate's outcome, simplest first
    pub candidates: Vec<CandidateScore>,
    /// Forest importances by feature name
    pub feature_importances: Option<BTreeMap<String, f32>>,
}

/// A trained pair: fitted pipeline plus its metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementModel {
    model: ScaledRegressor,
    metrics: MeasurementModelMetrics,
}

impl MeasurementModel {
    /// Training metrics.
    #[must_use]
    pub fn metrics(&self) -> &MeasurementModelMetrics {
        &self.metrics
    }
}

/// A pair that was not trained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedPair {
    /// `garment/measure`
    pub key: String,
    /// Why
    pub reason: String,
}

/// Outcome of [`RegressionBank::train`].
#[derive(Debug, Clone, Default)]
pub struct RegressionTrainingOutcome {
    /// Metrics of each trained pair
    pub trained: Vec<MeasurementModelMetrics>,
    /// Pairs left untrained
    pub skipped: Vec<SkippedPair>,
}

/// One served prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionPrediction {
    /// Predicted value (cm)
    pub value_cm: f32,
    /// `clamp(1 − rmse / scale, min, max)`
    pub confidence: f32,
    /// Model that produced it
    pub model_type: CandidateModel,
    /// Model CV RMSE
    pub rmse: f32,
}

/// Every requested measure of one garment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GarmentPrediction {
    /// Successful predictions by measure
    pub values: BTreeMap<String, RegressionPrediction>,
    /// Failures by measure
    pub failures: BTreeMap<String, String>,
}

/// Keyed set of trained measurement regressors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegressionBank {
    config: RegressionConfig,
    models: BTreeMap<String, MeasurementModel>,
}

impl RegressionBank {
    /// Creates an empty bank.
    #[must_use]
    pub fn new(config: RegressionConfig) -> Self {
        Self {
            config,
            models: BTreeMap::new(),
        }
    }

    /// Number of trained pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// True when nothing is trained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Trained keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Metrics of one pair.
    #[must_use]
    pub fn metrics(&self, garment: &str, measure: &str) -> Option<&MeasurementModelMetrics> {
        self.models
            .get(&model_key(garment, measure))
            .map(MeasurementModel::metrics)
    }

    /// Confidence derived from an RMSE.
    #[must_use]
    pub fn confidence_for_rmse(&self, rmse: f32) -> f32 {
        (1.0 - rmse / self.config.rmse_scale).clamp(self.config.min_confidence, self.config.max_confidence)
    }

    /// Trains every pair with at least `min_samples_per_measure` rows,
    /// replacing the bank's models.
    ///
    /// A failing candidate is recorded and skipped; a pair is skipped only
    /// when all candidates fail.
    pub fn train(&mut self, corpus: &[MeasurementExample]) -> RegressionTrainingOutcome {
        let mut groups: BTreeMap<String, Vec<&MeasurementExample>> = BTreeMap::new();
        for example in corpus {
            groups
                .entry(model_key(&example.target.garment, &example.target.measure))
                .or_default()
                .push(example);
        }

        let min_samples = self.config.min_samples_per_measure;
        let mut outcome = RegressionTrainingOutcome::default();
        let mut eligible = Vec::new();
        for (key, rows) in groups {
            if rows.len() < min_samples {
                tracing::debug!(key = %key, available = rows.len(), required = min_samples, "pair skipped");
                outcome.skipped.push(SkippedPair {
                    reason: SizewiseError::InsufficientData {
                        context: key.clone(),
                        available: rows.len(),
                        required: min_samples,
                    }
                    .to_string(),
                    key,
                });
            } else {
                eligible.push((key, rows));
            }
        }

        let config = &self.config;
        let results: Vec<(String, Result<MeasurementModel>)> = if config.parallel {
            eligible
                .into_par_iter()
                .map(|(key, rows)| {
                    let result = train_pair(config, &rows);
                    (key, result)
                })
                .collect()
        } else {
            eligible
                .into_iter()
                .map(|(key, rows)| {
                    let result = train_pair(config, &rows);
                    (key, result)
                })
                .collect()
        };

        let mut models = BTreeMap::new();
        for (key, result) in results {
            match result {
                Ok(model) => {
                    tracing::info!(
                        key = %key,
                        model = %model.metrics.model_type,
                        rmse = model.metrics.rmse,
                        n = model.metrics.n_samples,
                        "measurement model trained"
                    );
                    outcome.trained.push(model.metrics.clone());
                    models.insert(key, model);
                }
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "every candidate failed, pair skipped");
                    outcome.skipped.push(SkippedPair {
                        key,
                        reason: err.to_string(),
                    });
                }
            }
        }
        self.models = models;
        outcome
    }

    /// Predicts one measurement for a profile.
    ///
    /// # Errors
    ///
    /// `ModelNotFound` if the pair was never trained; `Estimator` on a
    /// numerical failure.
    pub fn predict(&self, garment: &str, measure: &str, profile: &Profile) -> Result<RegressionPrediction> {
        let key = model_key(garment, measure);
        let model = self
            .models
            .get(&key)
            .ok_or(SizewiseError::ModelNotFound { key })?;
        let features = FeatureRecord::for_measurement(profile);
        let value_cm = model.model.predict_row(features.values())?;
        if !value_cm.is_finite() {
            return Err(SizewiseError::estimator("regressor produced a non-finite value"));
        }
        Ok(RegressionPrediction {
            value_cm,
            confidence: self.confidence_for_rmse(model.metrics.rmse),
            model_type: model.metrics.model_type,
            rmse: model.metrics.rmse,
        })
    }

    /// Predicts every listed measure of a garment, collecting failures
    /// instead of stopping at the first.
    #[must_use]
    pub fn predict_garment(&self, garment: &str, measures: &[String], profile: &Profile) -> GarmentPrediction {
        let mut out = GarmentPrediction::default();
        for measure in measures {
            match self.predict(garment, measure, profile) {
                Ok(prediction) => {
                    out.values.insert(measure.clone(), prediction);
                }
                Err(err) => {
                    tracing::debug!(garment, measure = %measure, error = %err, "garment measure not predicted");
                    out.failures.insert(measure.clone(), err.to_string());
                }
            }
        }
        out
    }
}

fn train_pair(config: &RegressionConfig, rows: &[&MeasurementExample]) -> Result<MeasurementModel> {
    let first = rows
        .first()
        .ok_or_else(|| SizewiseError::InvalidInput("empty pair".into()))?;
    let records: Vec<&FeatureRecord> = rows.iter().map(|r| &r.features).collect();
    let x = design_matrix(&records)?;
    let y = Vector::from_vec(rows.iter().map(|r| r.target.value_cm).collect());
    let weights: Vec<f32> = rows.iter().map(|r| r.final_weight()).collect();

    let n = rows.len();
    let n_folds = (n / 3).min(config.max_folds).max(2);
    let cv = KFold::new(n_folds).with_random_state(config.random_state);

    let mut scores = Vec::new();
    let mut best: Option<(CandidateModel, f32)> = None;
    for candidate in CandidateModel::candidates(config) {
        match cross_val_mse(|| candidate.build(config.random_state), &x, &y, &weights, &cv) {
            Ok(result) if result.mean().is_finite() => {
                let mse = result.mean();
                // candidates arrive simplest first, so ties keep the simpler one
                if best.map_or(true, |(_, best_mse)| mse < best_mse) {
                    best = Some((candidate, mse));
                }
                scores.push(CandidateScore {
                    candidate,
                    cv_mse: Some(mse),
                    error: None,
                });
            }
            Ok(_) => scores.push(CandidateScore {
                candidate,
                cv_mse: None,
                error: Some("non-finite CV error".into()),
            }),
            Err(err) => {
                tracing::debug!(candidate = %candidate, error = %err, "candidate failed");
                scores.push(CandidateScore {
                    candidate,
                    cv_mse: None,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    let (winner, cv_mse) = best.ok_or_else(|| {
        let reasons: Vec<String> = scores
            .iter()
            .filter_map(|s| s.error.as_ref().map(|e| format!("{}: {e}", s.candidate.name())))
            .collect();
        SizewiseError::estimator(format!("all candidates failed ({})", reasons.join("; ")))
    })?;

    let mut model = winner.build(config.random_state);
    model.fit_weighted(&x, &y, Some(&weights))?;

    let feature_importances = model.feature_importances().map(|importances| {
        FeatureSchema::Measurement
            .names()
            .iter()
            .zip(importances)
            .map(|(name, value)| ((*name).to_string(), value))
            .collect()
    });

    Ok(MeasurementModel {
        model,
        metrics: MeasurementModelMetrics {
            garment: first.target.garment.clone(),
            measure: first.target.measure.clone(),
            model_type: winner,
            rmse: cv_mse.sqrt(),
            cv_mse,
            n_samples: n,
            n_folds,
            candidates: scores,
            feature_importances,
        },
    })
}
