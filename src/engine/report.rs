use crate::config::MODEL_VERSION;
use crate::dataset::StageReport;
use crate::error::SizewiseError;
use crate::policy::{MeasurementPrediction, SizeRecommendation};
use crate::registry::RegistryEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Overall result of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    /// Every model trained and was persisted
    Success,
    /// The data source yielded no usable example
    NoData,
    /// Some models were skipped
    Partial,
}

/// One trained and persisted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTrainingSummary {
    /// Registry name, or `garment/measure` key for measurement models
    pub name: String,
    /// Estimator family
    pub model_type: String,
    /// Rows the model saw
    pub n_samples: usize,
    /// Quality metrics
    pub metrics: BTreeMap<String, f32>,
    /// Registry version holding the model
    pub registry_version: u32,
}

/// A model that was not trained or not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedModel {
    /// Registry name or model key
    pub name: String,
    /// Why
    pub reason: String,
}

/// Outcome of `train_size_models` or `train_measurement_models`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Model generation tag
    pub model_version: String,
    /// Completion time
    pub trained_at: DateTime<Utc>,
    /// Overall status
    pub status: TrainingStatus,
    /// Models now served
    pub models: Vec<ModelTrainingSummary>,
    /// Models left out
    pub skipped: Vec<SkippedModel>,
    /// Historical records that failed normalization
    pub rejected_records: usize,
    /// Balancer stage counts, size training only
    pub balance: Vec<StageReport>,
}

impl TrainingReport {
    pub(super) fn new(rejected_records: usize) -> Self {
        Self {
            model_version: MODEL_VERSION.to_string(),
            trained_at: Utc::now(),
            status: TrainingStatus::NoData,
            models: Vec::new(),
            skipped: Vec::new(),
            rejected_records,
            balance: Vec::new(),
        }
    }

    pub(super) fn skip(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(SkippedModel {
            name: name.into(),
            reason: reason.into(),
        });
    }

    pub(super) fn finish(mut self) -> Self {
        self.status = match (self.models.is_empty(), self.skipped.is_empty()) {
            (true, true) => TrainingStatus::NoData,
            (false, true) => TrainingStatus::Success,
            _ => TrainingStatus::Partial,
        };
        self.trained_at = Utc::now();
        self
    }
}

/// What `Engine::load_models` found in the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Entries now served
    pub loaded: Vec<RegistryEntry>,
    /// Names with no registry entry yet
    pub missing: Vec<String>,
    /// Names that could not be loaded, e.g. failed checksums
    pub failed: Vec<SkippedModel>,
}

impl LoadReport {
    pub(super) fn record_failure(&mut self, name: &str, err: &SizewiseError) {
        match err {
            SizewiseError::RegistryMiss { .. } => self.missing.push(name.to_string()),
            SizewiseError::IntegrityError { .. } => {
                tracing::error!(model = name, error = %err, "refusing to serve corrupted model");
                self.failed.push(SkippedModel {
                    name: name.to_string(),
                    reason: err.to_string(),
                });
            }
            _ => {
                tracing::warn!(model = name, error = %err, "model not loaded");
                self.failed.push(SkippedModel {
                    name: name.to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }
}

/// Measurements for one garment of a profile bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GarmentRecommendation {
    /// Garment code
    pub garment: String,
    /// Served measurements by measure name
    pub measurements: BTreeMap<String, MeasurementPrediction>,
    /// Measures no tier could serve, with the error
    pub failures: BTreeMap<String, String>,
}

/// Size plus every catalog garment's measurements for one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecommendation {
    /// Session shared by every trace of the bundle
    pub session_id: String,
    /// Size decision
    pub size: SizeRecommendation,
    /// Per-garment measurements in catalog order
    pub garments: Vec<GarmentRecommendation>,
    /// Creation time
    pub generated_at: DateTime<Utc>,
}

impl ProfileRecommendation {
    /// Measurement decisions across all garments.
    #[must_use]
    pub fn measurement_count(&self) -> usize {
        self.garments.iter().map(|g| g.measurements.len()).sum()
    }
}
