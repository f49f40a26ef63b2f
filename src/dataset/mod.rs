//! Training corpora.
//!
//! Historical records from the data source are normalized into profiles,
//! turned into fixed-schema feature records and weighted by provenance,
//! fit feedback and recency. Corpora live for one training run only.

mod balancer;
mod oversample;

pub use balancer::{BalanceOutcome, BalanceStage, Balanceable, DatasetBalancer, StageReport};
pub use oversample::SyntheticOversampler;
pub use crate::profile::AgeBand;

use crate::config::WeightingConfig;
use crate::error::{Result, SizewiseError};
use crate::features::FeatureRecord;
use crate::profile::{Gender, MeasureField, ProfileNormalizer, RawProfileInput};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a historical record was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Entered by staff
    Manual,
    /// Produced automatically, then corrected
    Edited,
    /// Produced automatically
    Automatic,
    /// Generated by oversampling
    Synthetic,
}

impl Provenance {
    /// Sample-weight factor.
    #[must_use]
    pub fn weight(self, config: &WeightingConfig) -> f32 {
        match self {
            Self::Manual => config.manual,
            Self::Edited => config.edited,
            Self::Automatic => config.automatic,
            Self::Synthetic => config.synthetic,
        }
    }
}

/// Customer fit feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitRating {
    /// Fit as expected
    Perfect,
    /// Slightly small
    SlightlySmall,
    /// Slightly large
    SlightlyLarge,
    /// Clearly too small
    TooSmall,
    /// Clearly too large
    TooLarge,
}

impl FitRating {
    /// Parses `perfect`, `slightly_small`, `slightly_large`, `too_small` or
    /// `too_large` (case-insensitive).
    ///
    /// # Errors
    ///
    /// `InvalidInput` for any other value.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "perfect" => Ok(Self::Perfect),
            "slightly_small" => Ok(Self::SlightlySmall),
            "slightly_large" => Ok(Self::SlightlyLarge),
            "too_small" => Ok(Self::TooSmall),
            "too_large" => Ok(Self::TooLarge),
            other => Err(SizewiseError::InvalidInput(format!("unknown fit rating {other:?}"))),
        }
    }

    /// Sample-weight factor.
    #[must_use]
    pub fn weight(self, config: &WeightingConfig) -> f32 {
        match self {
            Self::Perfect => config.perfect_fit,
            Self::SlightlySmall | Self::SlightlyLarge => config.slight_misfit,
            Self::TooSmall | Self::TooLarge => config.poor_fit,
        }
    }

    /// Whether the recorded size is a usable label.
    #[must_use]
    pub fn is_reliable_size_label(self) -> bool {
        !matches!(self, Self::TooSmall | Self::TooLarge)
    }
}
/// Channel a piece of fit feedback arrived through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSource {
    /// Survey after the uniform was delivered
    #[default]
    PostDelivery,
    /// Try-on at a fitting session
    FittingSession,
    /// Raised through customer support
    Support,
}

/// Fit feedback for one garment issued to one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitFeedback {
    /// Overall fit
    pub fit_rating: FitRating,
    /// Per-area remarks, e.g. `sleeves -> slightly_long`
    #[serde(default)]
    pub specific_issues: BTreeMap<String, String>,
    /// 1 (worst) to 5 (best)
    #[serde(default)]
    pub satisfaction_score: Option<u8>,
    /// Free text
    #[serde(default)]
    pub written_feedback: Option<String>,
    /// Channel
    #[serde(default)]
    pub source: FeedbackSource,
    /// Who answered, e.g. `parent`
    #[serde(default)]
    pub responded_by: Option<String>,
}

impl FitFeedback {
    /// Feedback carrying only a rating.
    #[must_use]
    pub fn new(fit_rating: FitRating) -> Self {
        Self {
            fit_rating,
            specific_issues: BTreeMap::new(),
            satisfaction_score: None,
            written_feedback: None,
            source: FeedbackSource::default(),
            responded_by: None,
        }
    }

    /// Set satisfaction score.
    #[must_use]
    pub fn with_satisfaction(mut self, score: u8) -> Self {
        self.satisfaction_score = Some(score);
        self
    }

    /// Add a per-area remark.
    #[must_use]
    pub fn with_issue(mut self, area: impl Into<String>, remark: impl Into<String>) -> Self {
        self.specific_issues.insert(area.into(), remark.into());
        self
    }

    /// Set channel.
    #[must_use]
    pub fn with_source(mut self, source: FeedbackSource) -> Self {
        self.source = source;
        self
    }

    /// Rejects out-of-range scores and blank remarks.
    ///
    /// # Errors
    ///
    /// `InvalidInput` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if let Some(score) = self.satisfaction_score {
            if !(1..=5).contains(&score) {
                return Err(SizewiseError::InvalidInput(format!(
                    "satisfaction_score must lie in 1..=5, got {score}"
                )));
            }
        }
        if self
            .specific_issues
            .iter()
            .any(|(area, remark)| area.trim().is_empty() || remark.trim().is_empty())
        {
            return Err(SizewiseError::InvalidInput(
                "specific_issues entries need a non-empty area and remark".to_string(),
            ));
        }
        Ok(())
    }
}

/// Accepted feedback as handed to the feedback sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Profile the garment was issued to
    pub profile_ref: String,
    /// Garment code
    pub garment: String,
    /// Feedback body
    pub feedback: FitFeedback,
    /// Acceptance time
    pub received_at: DateTime<Utc>,
}

/// Target recorded alongside a historical profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordTarget {
    /// Size code that was issued
    Size(String),
    /// Garment measurement that was issued
    Measurement(MeasurementTarget),
}

/// One garment measurement label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementTarget {
    /// Garment code, e.g. `girls_skirt`
    pub garment: String,
    /// Garment measure name, e.g. `waist_cm`
    pub measure: String,
    /// Issued value (cm)
    pub value_cm: f32,
}

/// Labeled record as supplied by the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    /// Profile the record belongs to, when the source tracks one
    #[serde(default)]
    pub profile_ref: Option<String>,
    /// "M" or "F"
    pub gender: String,
    /// Whole years at capture
    pub age: i32,
    /// Height (cm)
    pub height_cm: f32,
    /// Weight (kg)
    pub weight_kg: f32,
    /// Body measurements captured with the record
    #[serde(default)]
    pub measurements: BTreeMap<MeasureField, f32>,
    /// Label
    pub target: RecordTarget,
    /// Capture channel
    pub provenance: Provenance,
    /// Fit feedback, if any
    #[serde(default)]
    pub fit_rating: Option<FitRating>,
    /// Days since capture
    pub record_age_days: f32,
}

impl HistoricalRecord {
    /// True if feedback on `garment` for `profile_ref` rates this record:
    /// the profile's size label, or its measurements of that garment.
    #[must_use]
    pub fn is_rated_by(&self, profile_ref: &str, garment: &str) -> bool {
        self.profile_ref.as_deref() == Some(profile_ref)
            && match &self.target {
                RecordTarget::Size(_) => true,
                RecordTarget::Measurement(target) => target.garment == garment,
            }
    }

    fn raw_input(&self) -> RawProfileInput {
        RawProfileInput {
            gender: self.gender.clone(),
            age: self.age,
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
            measurements: self.measurements.clone(),
            fit_preference: None,
            body_shape: None,
        }
    }
}

/// Feature record, label and weights for one training row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample<T> {
    /// Model input
    pub features: FeatureRecord,
    /// Label
    pub target: T,
    /// Provenance × feedback weight
    pub sample_weight: f32,
    /// Recency weight `exp(−days / decay)`
    pub temporal_weight: f32,
    /// Produced by oversampling
    pub synthetic: bool,
}

impl<T> TrainingExample<T> {
    /// Weight handed to estimators.
    #[must_use]
    pub fn final_weight(&self) -> f32 {
        self.sample_weight * self.temporal_weight
    }

    /// Gender encoded in the features.
    #[must_use]
    pub fn gender(&self) -> Gender {
        self.features.gender()
    }
}

/// Size-classifier training row.
pub type SizeExample = TrainingExample<String>;

/// Regression training row.
pub type MeasurementExample = TrainingExample<MeasurementTarget>;

/// Why a record did not become a training row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    /// Position in the input slice
    pub index: usize,
    /// Human-readable reason
    pub reason: String,
}

/// Rows built from one batch of records.
#[derive(Debug, Clone)]
pub struct Corpus<T> {
    /// Usable rows
    pub examples: Vec<TrainingExample<T>>,
    /// Records that were left out
    pub rejected: Vec<RejectedRecord>,
}

impl<T> Default for Corpus<T> {
    fn default() -> Self {
        Self {
            examples: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

/// Builds weighted training corpora from historical records.
#[derive(Debug, Clone)]
pub struct CorpusBuilder<'a> {
    normalizer: &'a ProfileNormalizer,
    weighting: &'a WeightingConfig,
}

impl<'a> CorpusBuilder<'a> {
    /// Creates a builder.
    #[must_use]
    pub fn new(normalizer: &'a ProfileNormalizer, weighting: &'a WeightingConfig) -> Self {
        Self {
            normalizer,
            weighting,
        }
    }

    /// Provenance × feedback weight of a record.
    #[must_use]
    pub fn sample_weight(&self, record: &HistoricalRecord) -> f32 {
        let feedback = record
            .fit_rating
            .map_or(1.0, |rating| rating.weight(self.weighting));
        record.provenance.weight(self.weighting) * feedback
    }

    /// Recency weight of a record.
    #[must_use]
    pub fn temporal_weight(&self, record: &HistoricalRecord) -> f32 {
        let days = record.record_age_days.max(0.0);
        (-days / self.weighting.temporal_decay_days).exp()
    }

    /// Size-labeled rows. Records with "too small/large" feedback are
    /// excluded since their size label is known to be wrong.
    #[must_use]
    pub fn size_corpus(&self, records: &[HistoricalRecord]) -> Corpus<String> {
        let mut corpus = Corpus::default();
        for (index, record) in records.iter().enumerate() {
            let RecordTarget::Size(code) = &record.target else {
                continue;
            };
            if record.fit_rating.is_some_and(|r| !r.is_reliable_size_label()) {
                corpus.rejected.push(RejectedRecord {
                    index,
                    reason: "unreliable size label (poor fit feedback)".into(),
                });
                continue;
            }
            match self.normalizer.normalize(&record.raw_input()) {
                Ok(profile) => corpus.examples.push(TrainingExample {
                    features: FeatureRecord::for_size(&profile),
                    target: code.clone(),
                    sample_weight: self.sample_weight(record),
                    temporal_weight: self.temporal_weight(record),
                    synthetic: record.provenance == Provenance::Synthetic,
                }),
                Err(err) => corpus.rejected.push(RejectedRecord {
                    index,
                    reason: err.to_string(),
                }),
            }
        }
        log_rejections("size", &corpus);
        corpus
    }

    /// Measurement-labeled rows.
    #[must_use]
    pub fn measurement_corpus(&self, records: &[HistoricalRecord]) -> Corpus<MeasurementTarget> {
        let mut corpus = Corpus::default();
        for (index, record) in records.iter().enumerate() {
            let RecordTarget::Measurement(target) = &record.target else {
                continue;
            };
            if !target.value_cm.is_finite() || target.value_cm <= 0.0 {
                corpus.rejected.push(RejectedRecord {
                    index,
                    reason: format!("invalid measurement value {}", target.value_cm),
                });
                continue;
            }
            match self.normalizer.normalize(&record.raw_input()) {
                Ok(profile) => corpus.examples.push(TrainingExample {
                    features: FeatureRecord::for_measurement(&profile),
                    target: target.clone(),
                    sample_weight: self.sample_weight(record),
                    temporal_weight: self.temporal_weight(record),
                    synthetic: record.provenance == Provenance::Synthetic,
                }),
                Err(err) => corpus.rejected.push(RejectedRecord {
                    index,
                    reason: err.to_string(),
                }),
            }
        }
        log_rejections("measurement", &corpus);
        corpus
    }
}

fn log_rejections<T>(kind: &str, corpus: &Corpus<T>) {
    if !corpus.rejected.is_empty() {
        tracing::warn!(
            corpus = kind,
            rejected = corpus.rejected.len(),
            kept = corpus.examples.len(),
            "records left out of training corpus"
        );
    }
}
