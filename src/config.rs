//! Engine configuration.
//!
//! Every component takes its own section at construction; nothing reads
//! ambient state. All sections deserialize with `#[serde(default)]` so a
//! partial JSON file overrides only what it names.

use crate::error::{Result, SizewiseError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Minimum rows a (garment, measure) pair needs before a regressor is trained.
pub const MIN_SAMPLES_PER_MEASURE: usize = 25;

/// Version tag stamped on trained models and training reports.
pub const MODEL_VERSION: &str = "v2.0";

/// Default seed for every stochastic step (bootstrap, folds, sampling).
pub const RANDOM_STATE: u64 = 42;

/// Confidence reported by the external rule function when it supplies none.
///
/// Historically a bare `0.7` literal repeated across fallbacks. Whether it is
/// a calibration anchor or a placeholder is unresolved and needs product
/// review before anyone tunes it.
pub const DEFAULT_RULE_CONFIDENCE: f32 = 0.7;

/// Size recommendations below this confidence are flagged for review.
pub const CONFIDENCE_THRESHOLD: f32 = 0.7;

/// Inclusive `[min, max]` range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Lower bound (inclusive)
    pub min: f32,
    /// Upper bound (inclusive)
    pub max: f32,
}

impl Bounds {
    /// Creates a range.
    #[must_use]
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// True when `value` lies inside the range.
    #[must_use]
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamps `value` into the range.
    #[must_use]
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Linear derivation `h·height + w·weight + intercept + puberty·clamp(age−9, 0, 5)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivationCoefficients {
    /// Height coefficient
    pub height: f32,
    /// Weight coefficient
    pub weight: f32,
    /// Constant term (cm)
    pub intercept: f32,
    /// Centimetres added per year of age past 9, for at most 5 years
    pub puberty: f32,
}

impl DerivationCoefficients {
    const fn new(height: f32, weight: f32, intercept: f32, puberty: f32) -> Self {
        Self {
            height,
            weight,
            intercept,
            puberty,
        }
    }

    /// Evaluates the derivation for one profile.
    #[must_use]
    pub fn evaluate(&self, age: u8, height_cm: f32, weight_kg: f32) -> f32 {
        let puberty_years = (f32::from(age) - 9.0).clamp(0.0, 5.0);
        self.height * height_cm + self.weight * weight_kg + self.intercept + self.puberty * puberty_years
    }
}

/// Age plausibility gate: at or below `max_age`, height and weight are capped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgeGate {
    /// Gate applies to ages `<= max_age`
    pub max_age: u8,
    /// Maximum plausible height (cm)
    pub max_height_cm: f32,
    /// Maximum plausible weight (kg)
    pub max_weight_kg: f32,
}

/// Profile normalizer settings: declared bounds and derivation tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Age (years)
    pub age: Bounds,
    /// Height (cm)
    pub height_cm: Bounds,
    /// Weight (kg)
    pub weight_kg: Bounds,
    /// Bust (cm, F)
    pub bust_cm: Bounds,
    /// Chest (cm, M)
    pub chest_cm: Bounds,
    /// Waist (cm)
    pub waist_cm: Bounds,
    /// Hip (cm, F)
    pub hip_cm: Bounds,
    /// Shoulder width (cm)
    pub shoulder_cm: Bounds,
    /// Sleeve length (cm)
    pub sleeve_length_cm: Bounds,
    /// Top length (cm, optional)
    pub top_length_cm: Bounds,
    /// Skirt length (cm, optional, F)
    pub skirt_length_cm: Bounds,
    /// Gates checked youngest first
    pub age_gates: Vec<AgeGate>,
    /// Female bust derivation
    pub female_bust: DerivationCoefficients,
    /// Female waist derivation
    pub female_waist: DerivationCoefficients,
    /// Female hip derivation
    pub female_hip: DerivationCoefficients,
    /// Male chest derivation
    pub male_chest: DerivationCoefficients,
    /// Male waist derivation
    pub male_waist: DerivationCoefficients,
    /// Shoulder derivation (both genders)
    pub shoulder: DerivationCoefficients,
    /// Sleeve derivation (both genders)
    pub sleeve_length: DerivationCoefficients,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            age: Bounds::new(3.0, 18.0),
            height_cm: Bounds::new(80.0, 250.0),
            weight_kg: Bounds::new(10.0, 200.0),
            bust_cm: Bounds::new(40.0, 140.0),
            chest_cm: Bounds::new(40.0, 140.0),
            waist_cm: Bounds::new(40.0, 140.0),
            hip_cm: Bounds::new(40.0, 160.0),
            shoulder_cm: Bounds::new(28.0, 50.0),
            sleeve_length_cm: Bounds::new(15.0, 65.0),
            top_length_cm: Bounds::new(30.0, 80.0),
            skirt_length_cm: Bounds::new(20.0, 60.0),
            age_gates: vec![
                AgeGate {
                    max_age: 5,
                    max_height_cm: 130.0,
                    max_weight_kg: 30.0,
                },
                AgeGate {
                    max_age: 10,
                    max_height_cm: 160.0,
                    max_weight_kg: 60.0,
                },
            ],
            female_bust: DerivationCoefficients::new(0.35, 0.6, 2.0, 1.2),
            female_waist: DerivationCoefficients::new(0.25, 0.55, 2.0, 0.0),
            female_hip: DerivationCoefficients::new(0.38, 0.65, 2.0, 1.5),
            male_chest: DerivationCoefficients::new(0.36, 0.6, 2.0, 0.0),
            male_waist: DerivationCoefficients::new(0.24, 0.55, 2.0, 0.0),
            shoulder: DerivationCoefficients::new(0.2, 0.1, 3.0, 0.0),
            sleeve_length: DerivationCoefficients::new(0.32, 0.0, 2.0, 0.0),
        }
    }
}

/// Dataset balancer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Allowed |F − M| after balancing
    pub gender_tolerance: usize,
    /// Age-band stage never downsamples a band below this count
    pub age_band_floor: usize,
    /// Class stage never downsamples a class below this count
    pub class_floor: usize,
    /// Neighbours considered by synthetic oversampling
    pub smote_neighbors: usize,
    /// Synthetic stage is skipped below this many numeric features
    pub min_numeric_features: usize,
    /// Sample-weight multiplier applied to synthetic rows
    pub synthetic_weight: f32,
    /// Seed for sampling
    pub random_state: u64,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            gender_tolerance: 5,
            age_band_floor: 20,
            class_floor: 10,
            smote_neighbors: 5,
            min_numeric_features: 3,
            synthetic_weight: 0.5,
            random_state: RANDOM_STATE,
        }
    }
}

/// Measurement regression bank settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    /// Pairs with fewer rows are skipped
    pub min_samples_per_measure: usize,
    /// Upper bound on CV folds
    pub max_folds: usize,
    /// Ridge candidate strength
    pub ridge_alpha: f32,
    /// Forest candidate size
    pub forest_trees: usize,
    /// Forest candidate depth
    pub forest_max_depth: usize,
    /// Forest candidate leaf size
    pub forest_min_samples_leaf: usize,
    /// Confidence = 1 − rmse / `rmse_scale`
    pub rmse_scale: f32,
    /// Confidence lower clamp
    pub min_confidence: f32,
    /// Confidence upper clamp
    pub max_confidence: f32,
    /// Train pairs on the rayon pool
    pub parallel: bool,
    /// Seed for folds and forests
    pub random_state: u64,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            min_samples_per_measure: MIN_SAMPLES_PER_MEASURE,
            max_folds: 5,
            ridge_alpha: 1.0,
            forest_trees: 50,
            forest_max_depth: 8,
            forest_min_samples_leaf: 2,
            rmse_scale: 50.0,
            min_confidence: 0.1,
            max_confidence: 0.95,
            parallel: true,
            random_state: RANDOM_STATE,
        }
    }
}

/// Size ensemble classifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Fraction of each class held out for calibration
    pub calibration_fraction: f32,
    /// Stratified folds used to weight ensemble members
    pub cv_folds: usize,
    /// Forest member size
    pub forest_trees: usize,
    /// Forest member depth
    pub forest_max_depth: usize,
    /// Softmax member iterations
    pub softmax_max_iter: usize,
    /// A model needs at least this many rows
    pub min_training_samples: usize,
    /// Number of ranked alternatives returned
    pub n_alternatives: usize,
    /// Confidence multiplier for a fit-preference step
    pub fit_adjustment_factor: f32,
    /// "snug" applies only at or above this age
    pub snug_min_age: u8,
    /// Recommendations below this are flagged for review
    pub confidence_threshold: f32,
    /// Seed for splits and forests
    pub random_state: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            calibration_fraction: 0.3,
            cv_folds: 3,
            forest_trees: 50,
            forest_max_depth: 10,
            softmax_max_iter: 300,
            min_training_samples: 20,
            n_alternatives: 3,
            fit_adjustment_factor: 0.9,
            snug_min_age: 10,
            confidence_threshold: CONFIDENCE_THRESHOLD,
            random_state: RANDOM_STATE,
        }
    }
}

/// Garment rule engine constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Skirt waist ease over body waist (cm)
    pub skirt_waist_ease: f32,
    /// Dupatta length / height
    pub dupatta_length_ratio: f32,
    /// Dupatta shortening factor for young children
    pub dupatta_young_factor: f32,
    /// "Young" means age at or below this
    pub young_age: u8,
    /// Skirt length / height
    pub skirt_length_ratio: f32,
    /// Skirt length multiplier per age band (3–6, 7–10, 11–14, 15–18)
    pub skirt_band_multipliers: [f32; 4],
    /// Kurta top length / height
    pub kurta_top_length_ratio: f32,
    /// Kurta chest ease over bust (cm)
    pub kurta_chest_ease: f32,
    /// Trouser waist ease over body waist (cm)
    pub pant_waist_ease: f32,
    /// Kurta pant length / height
    pub kurta_pant_length_ratio: f32,
    /// Formal/elastic pant length / height
    pub pant_length_ratio: f32,
    /// Shorts length / height
    pub shorts_length_ratio: f32,
    /// Shirt chest ease over chest (cm)
    pub shirt_chest_ease: f32,
    /// Blazer chest ease over chest (cm)
    pub blazer_chest_ease: f32,
    /// Extra girth ease for curvy/stocky shapes (cm)
    pub full_shape_ease: f32,
    /// Girth ease for slim shapes (cm, usually negative)
    pub slim_shape_ease: f32,
    /// Confidence of pure ease rules
    pub ease_rule_confidence: f32,
    /// Confidence of height-ratio rules
    pub ratio_rule_confidence: f32,
    /// Confidence of age-banded rules
    pub banded_rule_confidence: f32,
    /// Generic rule girth ease (cm)
    pub generic_girth_ease: f32,
    /// Generic rule length / height
    pub generic_length_ratio: f32,
    /// Generic rule confidence
    pub generic_confidence: f32,
    /// Age-only heuristic confidence
    pub age_only_confidence: f32,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            skirt_waist_ease: 2.0,
            dupatta_length_ratio: 1.2,
            dupatta_young_factor: 0.9,
            young_age: 10,
            skirt_length_ratio: 0.28,
            skirt_band_multipliers: [0.9, 0.95, 1.0, 1.05],
            kurta_top_length_ratio: 0.45,
            kurta_chest_ease: 8.0,
            pant_waist_ease: 2.0,
            kurta_pant_length_ratio: 0.55,
            pant_length_ratio: 0.6,
            shorts_length_ratio: 0.25,
            shirt_chest_ease: 8.0,
            blazer_chest_ease: 10.0,
            full_shape_ease: 2.0,
            slim_shape_ease: -1.0,
            ease_rule_confidence: 0.9,
            ratio_rule_confidence: 0.85,
            banded_rule_confidence: 0.8,
            generic_girth_ease: 4.0,
            generic_length_ratio: 0.4,
            generic_confidence: 0.75,
            age_only_confidence: 0.5,
        }
    }
}

/// Confidence ceilings for one fallback chain, highest tier first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierCeilings(pub Vec<f32>);

/// Decision policy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Size chain: ensemble, garment rule, generic rule, external rule, age-only
    pub size_ceilings: TierCeilings,
    /// Measurement chain: garment rule, trained model, generic rule, external rule, age-only
    pub measurement_ceilings: TierCeilings,
    /// Penalty per demotion caused by an expected miss
    pub expected_miss_penalty: f32,
    /// Penalty per demotion caused by a malfunction
    pub failure_penalty: f32,
    /// Confidence never drops below this
    pub confidence_floor: f32,
    /// Also run the external rule as a comparison baseline
    pub compare_with_external: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            size_ceilings: TierCeilings(vec![1.0, 0.85, 0.75, DEFAULT_RULE_CONFIDENCE, 0.5]),
            measurement_ceilings: TierCeilings(vec![0.9, 0.9, 0.75, DEFAULT_RULE_CONFIDENCE, 0.5]),
            expected_miss_penalty: 0.1,
            failure_penalty: 0.2,
            confidence_floor: 0.1,
            compare_with_external: true,
        }
    }
}

/// Training-row weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightingConfig {
    /// Manually entered record
    pub manual: f32,
    /// Automatic record later edited
    pub edited: f32,
    /// Automatic record
    pub automatic: f32,
    /// Synthetic record
    pub synthetic: f32,
    /// Feedback "perfect"
    pub perfect_fit: f32,
    /// Feedback "slightly small/large"
    pub slight_misfit: f32,
    /// Feedback "too small/large"
    pub poor_fit: f32,
    /// Days for the temporal weight to decay by a factor of e
    pub temporal_decay_days: f32,
}

impl Default for WeightingConfig {
    fn default() -> Self {
        Self {
            manual: 2.0,
            edited: 1.5,
            automatic: 1.0,
            synthetic: 0.5,
            perfect_fit: 3.0,
            slight_misfit: 2.0,
            poor_fit: 0.5,
            temporal_decay_days: 365.0,
        }
    }
}

/// Explanation recorder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Traces kept in memory; the oldest is evicted first
    pub max_in_memory_traces: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_in_memory_traces: 10_000,
        }
    }
}

/// Complete engine configuration.
///
/// # Examples
///
/// ```
/// use sizewise::config::EngineConfig;
///
/// let config = EngineConfig::from_json_str(r#"{ "regression": { "max_folds": 3 } }"#)
///     .expect("partial config");
/// assert_eq!(config.regression.max_folds, 3);
/// assert_eq!(config.regression.ridge_alpha, 1.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Profile normalizer
    pub normalizer: NormalizerConfig,
    /// Dataset balancer
    pub balancer: BalancerConfig,
    /// Regression bank
    pub regression: RegressionConfig,
    /// Size classifier
    pub classifier: ClassifierConfig,
    /// Garment rules
    pub rules: RuleConfig,
    /// Decision policy
    pub policy: PolicyConfig,
    /// Training weights
    pub weighting: WeightingConfig,
    /// Explanation recorder
    pub recorder: RecorderConfig,
}

impl EngineConfig {
    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` for malformed JSON and `Config` for invalid values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, otherwise as [`Self::from_json_str`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Rejects internally inconsistent settings.
    ///
    /// # Errors
    ///
    /// Returns `Config` naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        let n = &self.normalizer;
        for (name, bounds) in [
            ("age", n.age),
            ("height_cm", n.height_cm),
            ("weight_kg", n.weight_kg),
            ("bust_cm", n.bust_cm),
            ("chest_cm", n.chest_cm),
            ("waist_cm", n.waist_cm),
            ("hip_cm", n.hip_cm),
            ("shoulder_cm", n.shoulder_cm),
            ("sleeve_length_cm", n.sleeve_length_cm),
            ("top_length_cm", n.top_length_cm),
            ("skirt_length_cm", n.skirt_length_cm),
        ] {
            if !(bounds.min.is_finite() && bounds.max.is_finite() && bounds.min <= bounds.max) {
                return Err(config_error(format!("normalizer.{name}: min must not exceed max")));
            }
        }

        if self.regression.max_folds < 2 {
            return Err(config_error("regression.max_folds must be at least 2"));
        }
        if self.regression.min_samples_per_measure < 2 {
            return Err(config_error("regression.min_samples_per_measure must be at least 2"));
        }
        if self.regression.rmse_scale <= 0.0 {
            return Err(config_error("regression.rmse_scale must be positive"));
        }
        if self.regression.min_confidence > self.regression.max_confidence {
            return Err(config_error("regression.min_confidence exceeds max_confidence"));
        }
        if self.balancer.smote_neighbors == 0 {
            return Err(config_error("balancer.smote_neighbors must be at least 1"));
        }
        if self.recorder.max_in_memory_traces == 0 {
            return Err(config_error("recorder.max_in_memory_traces must be at least 1"));
        }
        if self.classifier.cv_folds < 2 {
            return Err(config_error("classifier.cv_folds must be at least 2"));
        }
        if !(0.0..1.0).contains(&self.classifier.calibration_fraction) {
            return Err(config_error("classifier.calibration_fraction must lie in [0, 1)"));
        }

        for (name, value) in [
            ("balancer.synthetic_weight", self.balancer.synthetic_weight),
            ("regression.min_confidence", self.regression.min_confidence),
            ("regression.max_confidence", self.regression.max_confidence),
            ("classifier.fit_adjustment_factor", self.classifier.fit_adjustment_factor),
            ("classifier.confidence_threshold", self.classifier.confidence_threshold),
            ("rules.ease_rule_confidence", self.rules.ease_rule_confidence),
            ("rules.ratio_rule_confidence", self.rules.ratio_rule_confidence),
            ("rules.banded_rule_confidence", self.rules.banded_rule_confidence),
            ("rules.generic_confidence", self.rules.generic_confidence),
            ("rules.age_only_confidence", self.rules.age_only_confidence),
            ("policy.expected_miss_penalty", self.policy.expected_miss_penalty),
            ("policy.failure_penalty", self.policy.failure_penalty),
            ("policy.confidence_floor", self.policy.confidence_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(config_error(format!("{name} must lie in [0, 1], got {value}")));
            }
        }

        let w = &self.weighting;
        if !(w.temporal_decay_days.is_finite() && w.temporal_decay_days > 0.0) {
            return Err(config_error(format!(
                "weighting.temporal_decay_days must be positive, got {}",
                w.temporal_decay_days
            )));
        }
        for (name, value) in [
            ("weighting.manual", w.manual),
            ("weighting.edited", w.edited),
            ("weighting.automatic", w.automatic),
            ("weighting.synthetic", w.synthetic),
            ("weighting.perfect_fit", w.perfect_fit),
            ("weighting.slight_misfit", w.slight_misfit),
            ("weighting.poor_fit", w.poor_fit),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(config_error(format!("{name} must be finite and non-negative, got {value}")));
            }
        }

        for (name, ceilings) in [
            ("policy.size_ceilings", &self.policy.size_ceilings),
            ("policy.measurement_ceilings", &self.policy.measurement_ceilings),
        ] {
            if ceilings.0.len() != 5 {
                return Err(config_error(format!("{name} needs one ceiling per tier (5)")));
            }
            if ceilings.0.iter().any(|c| !(0.0..=1.0).contains(c)) {
                return Err(config_error(format!("{name} values must lie in [0, 1]")));
            }
            if ceilings.0.windows(2).any(|pair| pair[1] > pair[0]) {
                return Err(config_error(format!("{name} must not increase down the chain")));
            }
        }
        Ok(())
    }
}

fn config_error(msg: impl Into<String>) -> SizewiseError {
    SizewiseError::Config(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        EngineConfig::default().validate().expect("defaults validate");
    }

    #[test]
    fn test_partial_json_keeps_other_defaults() {
        let config = EngineConfig::from_json_str(r#"{"policy": {"failure_penalty": 0.15}}"#)
            .expect("valid");
        assert!((config.policy.failure_penalty - 0.15).abs() < 1e-6);
        assert_eq!(config.policy.expected_miss_penalty, 0.1);
        assert_eq!(config.regression.min_samples_per_measure, MIN_SAMPLES_PER_MEASURE);
    }

    #[test]
    fn test_rejects_single_fold() {
        let err = EngineConfig::from_json_str(r#"{"regression": {"max_folds": 1}}"#)
            .expect_err("invalid");
        assert!(matches!(err, SizewiseError::Config(_)));
    }

    #[test]
    fn test_rejects_increasing_ceilings() {
        let mut config = EngineConfig::default();
        config.policy.size_ceilings = TierCeilings(vec![0.5, 0.9, 0.4, 0.3, 0.2]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_confidence_out_of_range() {
        let mut config = EngineConfig::default();
        config.rules.generic_confidence = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_temporal_decay() {
        let err = EngineConfig::from_json_str(r#"{"weighting": {"temporal_decay_days": 0.0}}"#)
            .expect_err("division by zero days");
        assert!(matches!(err, SizewiseError::Config(ref msg) if msg.contains("temporal_decay_days")));

        let mut config = EngineConfig::default();
        config.weighting.temporal_decay_days = -30.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_provenance_weight() {
        let mut config = EngineConfig::default();
        config.weighting.edited = -1.5;
        let err = config.validate().expect_err("negative weight");
        assert!(matches!(err, SizewiseError::Config(ref msg) if msg.contains("weighting.edited")));
    }

    #[test]
    fn test_rejects_non_finite_feedback_weight() {
        let mut config = EngineConfig::default();
        config.weighting.perfect_fit = f32::NAN;
        assert!(config.validate().is_err());
        config.weighting.perfect_fit = 3.0;
        config.weighting.poor_fit = f32::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_smote_neighbors_and_trace_cap() {
        let mut config = EngineConfig::default();
        config.balancer.smote_neighbors = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.recorder.max_in_memory_traces = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        let err = EngineConfig::from_json_str("{ not json").expect_err("malformed");
        assert!(matches!(err, SizewiseError::Serialization(_)));
    }

    #[test]
    fn test_from_json_file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("engine.json");
        let json = serde_json::to_string(&EngineConfig::default()).expect("serialize");
        std::fs::write(&path, json).expect("write");
        let loaded = EngineConfig::from_json_file(&path).expect("load");
        assert_eq!(loaded, EngineConfig::default());
    }

    #[test]
    fn test_derivation_puberty_term_is_capped() {
        let coeffs = DerivationCoefficients::new(0.0, 0.0, 0.0, 1.0);
        assert_eq!(coeffs.evaluate(8, 100.0, 20.0), 0.0);
        assert_eq!(coeffs.evaluate(12, 100.0, 20.0), 3.0);
        assert_eq!(coeffs.evaluate(18, 100.0, 20.0), 5.0);
    }
}
