//! Size recommendation from calibrated per-gender ensembles.
//!
//! One [`SizeEnsemble`] is trained per gender plus a gender-agnostic
//! universal model used when the gender model is missing. Predictions are
//! the arg-max of calibrated probabilities, shifted one rung along the
//! [`SizeLadder`] for loose or snug fit preferences.

mod ensemble;
mod ladder;

pub use ensemble::{SizeEnsemble, SizeModelMetrics};
pub use ladder::SizeLadder;

use crate::config::ClassifierConfig;
use crate::dataset::SizeExample;
use crate::error::{Result, SizewiseError};
use crate::explain::{ConfidenceImpact, ExplanationStep};
use crate::features::FeatureRecord;
use crate::profile::{FitPreference, Gender, Profile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which rows a size model was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelScope {
    /// Girls only
    Female,
    /// Boys only
    Male,
    /// Every row
    Universal,
}

impl ModelScope {
    /// Training order.
    pub const ALL: [ModelScope; 3] = [ModelScope::Female, ModelScope::Male, ModelScope::Universal];

    /// Gender-specific scope.
    #[must_use]
    pub fn for_gender(gender: Gender) -> Self {
        match gender {
            Gender::Female => Self::Female,
            Gender::Male => Self::Male,
        }
    }

    /// Name under which the model is kept in the registry.
    #[must_use]
    pub fn registry_name(self) -> &'static str {
        match self {
            Self::Female => "size_classifier_female",
            Self::Male => "size_classifier_male",
            Self::Universal => "size_classifier_universal",
        }
    }

    fn admits(self, gender: Gender) -> bool {
        match self {
            Self::Universal => true,
            scope => scope == Self::for_gender(gender),
        }
    }
}

/// A size code and its calibrated probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSize {
    /// Size code
    pub size_code: String,
    /// Calibrated probability
    pub probability: f32,
}

/// Classifier output for one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizePrediction {
    /// Recommended size after fit adjustment
    pub size_code: String,
    /// Calibrated probability of the model's pick, times any adjustment factor
    pub confidence: f32,
    /// Model's pick before fit adjustment
    pub model_pick: String,
    /// Next most likely sizes, never containing `size_code`
    pub alternatives: Vec<RankedSize>,
    /// Model that served the request
    pub scope: ModelScope,
    /// Every class probability
    pub probabilities: BTreeMap<String, f32>,
    /// Confidence below the review threshold
    pub needs_review: bool,
    /// Model selection and adjustment steps
    pub steps: Vec<ExplanationStep>,
}

/// A scope that could not be trained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedScope {
    /// Scope
    pub scope: ModelScope,
    /// Why
    pub reason: String,
}

/// Outcome of [`SizeClassifier::train`].
#[derive(Debug, Clone, Default)]
pub struct SizeTrainingOutcome {
    /// Metrics of each trained scope
    pub trained: Vec<SizeModelMetrics>,
    /// Scopes left untrained
    pub skipped: Vec<SkippedScope>,
}

/// Per-gender calibrated size ensembles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SizeClassifier {
    config: ClassifierConfig,
    ladder: SizeLadder,
    models: BTreeMap<ModelScope, SizeEnsemble>,
}

impl SizeClassifier {
    /// Creates an untrained classifier over the default ladder.
    #[must_use]
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            ladder: SizeLadder::default(),
            models: BTreeMap::new(),
        }
    }

    /// Replaces the size ladder.
    #[must_use]
    pub fn with_ladder(mut self, ladder: SizeLadder) -> Self {
        self.ladder = ladder;
        self
    }

    /// Size ladder.
    #[must_use]
    pub fn ladder(&self) -> &SizeLadder {
        &self.ladder
    }

    /// Scopes with a trained model.
    pub fn scopes(&self) -> impl Iterator<Item = ModelScope> + '_ {
        self.models.keys().copied()
    }

    /// True when no scope is trained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Model of one scope.
    #[must_use]
    pub fn model(&self, scope: ModelScope) -> Option<&SizeEnsemble> {
        self.models.get(&scope)
    }

    /// Installs a model, e.g. one loaded from the registry.
    pub fn insert_model(&mut self, scope: ModelScope, model: SizeEnsemble) {
        self.models.insert(scope, model);
    }

    /// Trains every scope and replaces the current models.
    ///
    /// Scopes with too few rows or a single class are skipped; their
    /// previous model is dropped too.
    pub fn train(&mut self, examples: &[SizeExample]) -> SizeTrainingOutcome {
        let mut outcome = SizeTrainingOutcome::default();
        let mut models = BTreeMap::new();

        for scope in ModelScope::ALL {
            let rows: Vec<&SizeExample> = examples.iter().filter(|e| scope.admits(e.gender())).collect();
            match SizeEnsemble::train(scope.registry_name(), &rows, &self.ladder, &self.config) {
                Ok(model) => {
                    let metrics = model.metrics();
                    tracing::info!(
                        model = scope.registry_name(),
                        n_classes = metrics.classes.len(),
                        n_train = metrics.n_train,
                        holdout_accuracy = ?metrics.holdout_accuracy,
                        temperature = metrics.temperature,
                        "trained size model"
                    );
                    outcome.trained.push(metrics.clone());
                    models.insert(scope, model);
                }
                Err(err) => {
                    tracing::warn!(model = scope.registry_name(), error = %err, "size model skipped");
                    outcome.skipped.push(SkippedScope {
                        scope,
                        reason: err.to_string(),
                    });
                }
            }
        }

        self.models = models;
        outcome
    }

    /// Recommends a size.
    ///
    /// # Errors
    ///
    /// `ModelNotFound` when neither the gender model nor the universal
    /// model is trained; estimator errors from the selected model.
    pub fn predict(&self, profile: &Profile) -> Result<SizePrediction> {
        let requested = ModelScope::for_gender(profile.gender());
        let (scope, model) = self
            .models
            .get(&requested)
            .map(|m| (requested, m))
            .or_else(|| self.models.get(&ModelScope::Universal).map(|m| (ModelScope::Universal, m)))
            .ok_or_else(|| SizewiseError::ModelNotFound {
                key: requested.registry_name().to_string(),
            })?;

        let mut steps = vec![ExplanationStep::new("model_selection")
            .input("gender", profile.gender().code())
            .input("requested_model", requested.registry_name())
            .output(scope.registry_name())
            .reasoning(if scope == requested {
                "gender-specific model available".to_string()
            } else {
                format!("{} not trained, using universal model", requested.registry_name())
            })];

        let probabilities = model.predict_proba(&FeatureRecord::for_size(profile))?;
        let classes = model.classes();
        let mut ranked: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let (top, top_probability) = *ranked
            .first()
            .ok_or_else(|| SizewiseError::estimator("model returned no classes"))?;
        let model_pick = classes[top].clone();

        steps.push(
            ExplanationStep::new("ensemble_prediction")
                .input("n_classes", classes.len())
                .output(model_pick.as_str())
                .reasoning("arg-max of calibrated ensemble probabilities")
                .impact(ConfidenceImpact::Absolute(top_probability)),
        );

        let (size_code, confidence) = self.adjust_for_fit(profile, &model_pick, top_probability, &mut steps);
        let confidence = confidence.clamp(0.0, 1.0);

        let alternatives: Vec<RankedSize> = ranked
            .iter()
            .filter(|(i, _)| classes[*i] != size_code)
            .take(self.config.n_alternatives)
            .map(|&(i, p)| RankedSize {
                size_code: classes[i].clone(),
                probability: p,
            })
            .collect();

        let needs_review = confidence < self.config.confidence_threshold;
        if needs_review {
            steps.push(
                ExplanationStep::new("review_flag")
                    .input("threshold", self.config.confidence_threshold)
                    .output(true)
                    .reasoning("confidence below review threshold"),
            );
        }

        Ok(SizePrediction {
            size_code,
            confidence,
            model_pick,
            alternatives,
            scope,
            probabilities: classes.iter().cloned().zip(probabilities).collect(),
            needs_review,
            steps,
        })
    }

    fn adjust_for_fit(
        &self,
        profile: &Profile,
        pick: &str,
        confidence: f32,
        steps: &mut Vec<ExplanationStep>,
    ) -> (String, f32) {
        let preference = profile.fit_preference();
        let target = match preference {
            FitPreference::Standard => return (pick.to_string(), confidence),
            FitPreference::Snug if profile.age() < self.config.snug_min_age => {
                steps.push(
                    ExplanationStep::new("fit_adjustment")
                        .input("preference", "snug")
                        .input("age", profile.age())
                        .output(pick)
                        .reasoning(format!(
                            "snug adjustment applies from age {}",
                            self.config.snug_min_age
                        )),
                );
                return (pick.to_string(), confidence);
            }
            FitPreference::Snug => self.ladder.step_down(pick),
            FitPreference::Loose => self.ladder.step_up(pick),
        };

        let label = match preference {
            FitPreference::Loose => "loose",
            _ => "snug",
        };
        match target {
            Some(adjusted) => {
                let factor = self.config.fit_adjustment_factor;
                steps.push(
                    ExplanationStep::new("fit_adjustment")
                        .input("preference", label)
                        .input("from", pick)
                        .output(adjusted)
                        .reasoning(format!("{label} fit moves one size along the ladder"))
                        .impact(ConfidenceImpact::Factor(factor)),
                );
                (adjusted.to_string(), confidence * factor)
            }
            None => {
                steps.push(
                    ExplanationStep::new("fit_adjustment")
                        .input("preference", label)
                        .input("from", pick)
                        .output(pick)
                        .reasoning("already at the end of the size ladder"),
                );
                (pick.to_string(), confidence)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
