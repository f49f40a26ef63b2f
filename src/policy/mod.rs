//! Decision policy and fallback chains.
//!
//! Size chain: ensemble, garment rule (girth chart), generic rule (height
//! chart), external rule function, age-only heuristic.
//! Measurement chain: garment rule, trained regressor, generic rule,
//! external rule function, age-only heuristic.
//!
//! The first tier that succeeds ends the chain. Every failed tier adds a
//! demotion step and a penalty; the served confidence is
//! `max(floor, min(raw, tier ceiling) − accumulated penalty)`. Ceilings
//! never increase down the chain, so a lower tier can never report more
//! than a higher tier's ceiling minus the penalties already paid.

mod chain;

pub use chain::{Tier, TierAttempt};

use crate::collaborators::{rule_function_confidence, RuleFunction, SizeLookup};
use crate::config::{PolicyConfig, RuleConfig, CONFIDENCE_THRESHOLD, DEFAULT_RULE_CONFIDENCE};
use crate::error::{Result, SizewiseError};
use crate::explain::{AlternativeComparison, ConfidenceImpact, ExplanationStep, ExplanationTrace, StepValue};
use crate::features::FeatureRecord;
use crate::profile::{FieldOrigin, Profile};
use crate::regression_bank::{model_key, RegressionBank};
use crate::rules::{AgeOnlyHeuristic, GarmentRuleEngine, GenericAnthropometricRule, RuleOutcome, RuleSize};
use crate::size_classifier::{RankedSize, SizeClassifier};
use chain::{ChainRunner, TierResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

/// Largest gap (cm) at which an external measurement counts as agreeing.
pub const AGREEMENT_TOLERANCE_CM: f32 = 2.0;

/// Size tiers, highest first.
pub const SIZE_CHAIN: [Tier; 5] = [
    Tier::Ensemble,
    Tier::GarmentRule,
    Tier::GenericRule,
    Tier::ExternalRule,
    Tier::AgeOnly,
];

/// Measurement tiers, highest first.
pub const MEASUREMENT_CHAIN: [Tier; 5] = [
    Tier::GarmentRule,
    Tier::TrainedModel,
    Tier::GenericRule,
    Tier::ExternalRule,
    Tier::AgeOnly,
];

/// External rule-function result kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalComparison {
    /// What the rule function produced
    pub value: StepValue,
    /// Its confidence
    pub confidence: f32,
    /// Whether it agrees with the served decision
    pub agrees: bool,
}

/// Served size recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeRecommendation {
    /// Trace id for [`crate::engine::Engine::get_explanation`]
    pub decision_id: Uuid,
    /// Size code
    pub size_code: String,
    /// Catalog identifier, when the lookup knows the code
    pub size_id: Option<i64>,
    /// Final confidence in `[0, 1]`
    pub confidence: f32,
    /// Next most likely sizes; never contains `size_code`
    pub alternatives: Vec<RankedSize>,
    /// Method tag of the serving tier
    pub method: String,
    /// Serving tier
    pub tier: Tier,
    /// One-line summary
    pub reasoning: String,
    /// Profile values the decision used
    pub decision_factors: BTreeMap<String, StepValue>,
    /// Confidence below the review threshold
    pub needs_review: bool,
    /// External rule-function baseline
    pub sql_recommendation: Option<ExternalComparison>,
    /// Every method compared against the decision
    pub comparison_with_alternatives: Vec<AlternativeComparison>,
    /// Tier attempts in order
    pub attempts: Vec<TierAttempt>,
}

/// Served garment measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPrediction {
    /// Trace id
    pub decision_id: Uuid,
    /// Garment code
    pub garment: String,
    /// Garment measure name
    pub measure_name: String,
    /// Served value (cm)
    pub value_cm: f32,
    /// Final confidence in `[0, 1]`
    pub confidence: f32,
    /// Method tag; `manual_override` for overrides
    pub method: String,
    /// Serving tier; `None` for overrides
    pub tier: Option<Tier>,
    /// Whether a manual value was served
    pub manual_override: bool,
    /// Value the chain produced, if any, when overridden
    pub original_value: Option<f32>,
    /// External rule-function baseline
    pub comparison: Option<ExternalComparison>,
    /// Tier attempts in order
    pub attempts: Vec<TierAttempt>,
}

struct SizePick {
    size_code: String,
    alternatives: Vec<RankedSize>,
}

fn rule_size_result(rule: RuleSize, tier: Tier) -> TierResult<SizePick> {
    TierResult {
        value: SizePick {
            size_code: rule.size_code,
            alternatives: Vec::new(),
        },
        raw_confidence: rule.confidence,
        method: tier.as_str().to_string(),
        steps: rule.steps,
    }
}

fn rule_measure_result(rule: RuleOutcome, tier: Tier) -> TierResult<f32> {
    TierResult {
        value: rule.value_cm,
        raw_confidence: rule.confidence,
        method: format!("{}:{}", tier.as_str(), rule.rule),
        steps: rule.steps,
    }
}

/// Runs the fallback chains against the current models and collaborators.
pub struct DecisionPolicy {
    config: PolicyConfig,
    garment_rules: GarmentRuleEngine,
    generic: GenericAnthropometricRule,
    age_only: AgeOnlyHeuristic,
    rule_function: Arc<dyn RuleFunction>,
    size_lookup: Arc<dyn SizeLookup>,
    disabled: BTreeSet<Tier>,
}

impl std::fmt::Debug for DecisionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionPolicy")
            .field("config", &self.config)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

impl DecisionPolicy {
    /// Creates a policy.
    #[must_use]
    pub fn new(
        config: PolicyConfig,
        rules: RuleConfig,
        rule_function: Arc<dyn RuleFunction>,
        size_lookup: Arc<dyn SizeLookup>,
    ) -> Self {
        Self {
            config,
            garment_rules: GarmentRuleEngine::new(rules.clone()),
            generic: GenericAnthropometricRule::new(rules.clone()),
            age_only: AgeOnlyHeuristic::new(rules),
            rule_function,
            size_lookup,
            disabled: BTreeSet::new(),
        }
    }

    /// Makes `tier` fail on every request, demoting to the next one.
    #[must_use]
    pub fn with_disabled_tier(mut self, tier: Tier) -> Self {
        self.disabled.insert(tier);
        self
    }

    /// Policy settings.
    #[must_use]
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Garment rule engine used by the measurement chain.
    #[must_use]
    pub fn garment_rules(&self) -> &GarmentRuleEngine {
        &self.garment_rules
    }

    fn runner<'a>(&'a self, ceilings: &'a [f32]) -> ChainRunner<'a> {
        ChainRunner {
            ceilings,
            config: &self.config,
            disabled: &self.disabled,
        }
    }

    /// Recommends a size, recording every step into `trace`.
    ///
    /// # Errors
    ///
    /// `AllTiersExhausted` when every tier fails.
    pub fn recommend_size(
        &self,
        classifier: Option<&SizeClassifier>,
        profile: &Profile,
        trace: &mut ExplanationTrace,
    ) -> Result<SizeRecommendation> {
        annotate_profile(profile, &FeatureRecord::for_size(profile), trace);

        let outcome = self
            .runner(&self.config.size_ceilings.0)
            .run("size", &SIZE_CHAIN, trace, |tier| match tier {
                Tier::Ensemble => {
                    let classifier = classifier.ok_or_else(|| SizewiseError::ModelNotFound {
                        key: "size_classifier".to_string(),
                    })?;
                    let prediction = classifier.predict(profile)?;
                    Ok(TierResult {
                        value: SizePick {
                            size_code: prediction.size_code,
                            alternatives: prediction.alternatives,
                        },
                        raw_confidence: prediction.confidence,
                        method: format!("{}:{}", tier.as_str(), prediction.scope.registry_name()),
                        steps: prediction.steps,
                    })
                }
                Tier::GarmentRule => Ok(rule_size_result(self.garment_rules.size_from_girth(profile)?, tier)),
                Tier::GenericRule => Ok(rule_size_result(self.generic.size_from_height(profile), tier)),
                Tier::ExternalRule => {
                    let result = self.rule_function.recommend_size(profile)?;
                    let confidence = rule_function_confidence(&result);
                    Ok(TierResult {
                        steps: vec![ExplanationStep::new("external_rule_size")
                            .output(result.size_code.as_str())
                            .reasoning("deterministic rule function")
                            .impact(ConfidenceImpact::Absolute(confidence))],
                        value: SizePick {
                            size_code: result.size_code,
                            alternatives: Vec::new(),
                        },
                        raw_confidence: confidence,
                        method: tier.as_str().to_string(),
                    })
                }
                Tier::AgeOnly => Ok(rule_size_result(self.age_only.size(profile), tier)),
                Tier::TrainedModel => Err(SizewiseError::NoRule {
                    garment: "size".to_string(),
                    measure: tier.as_str().to_string(),
                }),
            })?;

        let size_code = outcome.value.size_code;
        let alternatives: Vec<RankedSize> = outcome
            .value
            .alternatives
            .into_iter()
            .filter(|a| a.size_code != size_code)
            .collect();

        let size_id = match self.size_lookup.size_id(profile.gender(), &size_code) {
            Ok(id) => {
                if id.is_none() {
                    trace.add_note(format!("size code {size_code} has no catalog id"));
                }
                id
            }
            Err(err) => {
                tracing::warn!(size_code = %size_code, error = %err, "size lookup unavailable");
                trace.add_note(format!("size lookup unavailable: {err}"));
                None
            }
        };

        let sql_recommendation = if outcome.tier == Tier::ExternalRule {
            Some(ExternalComparison {
                value: StepValue::Text(size_code.clone()),
                confidence: outcome.raw_confidence,
                agrees: true,
            })
        } else if self.config.compare_with_external {
            match self.rule_function.recommend_size(profile) {
                Ok(baseline) => Some(ExternalComparison {
                    agrees: baseline.size_code == size_code,
                    confidence: rule_function_confidence(&baseline),
                    value: StepValue::Text(baseline.size_code),
                }),
                Err(err) => {
                    tracing::warn!(error = %err, "external rule comparison unavailable");
                    trace.add_note(format!("external rule comparison unavailable: {err}"));
                    None
                }
            }
        } else {
            None
        };
        if let Some(comparison) = &sql_recommendation {
            trace.add_alternative(AlternativeComparison {
                method: Tier::ExternalRule.as_str().to_string(),
                value: comparison.value.clone(),
                confidence: comparison.confidence,
                agrees: comparison.agrees,
            });
        }
        for alternative in &alternatives {
            trace.add_alternative(AlternativeComparison {
                method: "ranked_alternative".to_string(),
                value: StepValue::Text(alternative.size_code.clone()),
                confidence: alternative.probability,
                agrees: false,
            });
        }

        let needs_review = outcome.confidence < CONFIDENCE_THRESHOLD;
        trace.finish(outcome.method.clone(), outcome.confidence);

        let decision_factors = BTreeMap::from([
            ("gender".to_string(), StepValue::from(profile.gender().code())),
            ("age".to_string(), StepValue::from(profile.age())),
            ("height_cm".to_string(), StepValue::from(profile.height_cm())),
            ("weight_kg".to_string(), StepValue::from(profile.weight_kg())),
            ("bmi".to_string(), StepValue::from(profile.bmi())),
            ("fit_preference".to_string(), StepValue::from(format!("{:?}", profile.fit_preference()).to_lowercase())),
        ]);

        Ok(SizeRecommendation {
            decision_id: trace.decision_id(),
            reasoning: format!(
                "{} via {} with confidence {:.2}",
                size_code, outcome.method, outcome.confidence
            ),
            comparison_with_alternatives: trace.alternatives().to_vec(),
            size_code,
            size_id,
            confidence: outcome.confidence,
            alternatives,
            method: outcome.method,
            tier: outcome.tier,
            decision_factors,
            needs_review,
            sql_recommendation,
            attempts: outcome.attempts,
        })
    }

    /// Predicts one garment measure, recording every step into `trace`.
    ///
    /// A `manual_override` is always served with confidence 1.0; the chain
    /// still runs best-effort to report the value it replaced.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a non-finite or non-positive override;
    /// `AllTiersExhausted` when every tier fails and no override is given.
    pub fn predict_measurement(
        &self,
        bank: Option<&RegressionBank>,
        garment: &str,
        measure: &str,
        profile: &Profile,
        manual_override: Option<f32>,
        trace: &mut ExplanationTrace,
    ) -> Result<MeasurementPrediction> {
        if let Some(value) = manual_override {
            if !value.is_finite() || value <= 0.0 {
                return Err(SizewiseError::InvalidInput(format!(
                    "manual override for {garment}/{measure} must be a positive length, got {value}"
                )));
            }
        }
        annotate_profile(profile, &FeatureRecord::for_measurement(profile), trace);

        let chained = self
            .runner(&self.config.measurement_ceilings.0)
            .run("measurement", &MEASUREMENT_CHAIN, trace, |tier| match tier {
                Tier::GarmentRule => Ok(rule_measure_result(
                    self.garment_rules.compute(garment, measure, profile)?,
                    tier,
                )),
                Tier::TrainedModel => {
                    let bank = bank.ok_or_else(|| SizewiseError::ModelNotFound {
                        key: model_key(garment, measure),
                    })?;
                    let prediction = bank.predict(garment, measure, profile)?;
                    Ok(TierResult {
                        value: prediction.value_cm,
                        raw_confidence: prediction.confidence,
                        method: format!("{}:{}", tier.as_str(), prediction.model_type.name()),
                        steps: vec![ExplanationStep::new("regression_model")
                            .input("model", prediction.model_type.name())
                            .input("rmse", prediction.rmse)
                            .output(prediction.value_cm)
                            .reasoning("confidence = clamp(1 - rmse / scale)")
                            .impact(ConfidenceImpact::Absolute(prediction.confidence))],
                    })
                }
                Tier::GenericRule => Ok(rule_measure_result(self.generic.compute(garment, measure, profile)?, tier)),
                Tier::ExternalRule => {
                    let value = self
                        .rule_function
                        .autofill_measure(garment, measure, profile)?
                        .ok_or_else(|| SizewiseError::NoRule {
                            garment: garment.to_string(),
                            measure: measure.to_string(),
                        })?;
                    Ok(TierResult {
                        value,
                        raw_confidence: DEFAULT_RULE_CONFIDENCE,
                        method: tier.as_str().to_string(),
                        steps: vec![ExplanationStep::new("external_rule_measure")
                            .output(value)
                            .reasoning("deterministic rule function autofill")
                            .impact(ConfidenceImpact::Absolute(DEFAULT_RULE_CONFIDENCE))],
                    })
                }
                Tier::AgeOnly => Ok(rule_measure_result(self.age_only.compute(garment, measure, profile)?, tier)),
                Tier::Ensemble => Err(SizewiseError::NoRule {
                    garment: garment.to_string(),
                    measure: tier.as_str().to_string(),
                }),
            });

        if let Some(value) = manual_override {
            let original_value = match &chained {
                Ok(outcome) => Some(outcome.value),
                Err(err) => {
                    trace.add_note(format!("no model value to compare with the override: {err}"));
                    None
                }
            };
            trace.push_step(
                ExplanationStep::new("manual_override")
                    .input("override_cm", value)
                    .output(value)
                    .reasoning("value supplied by the user replaces any prediction")
                    .impact(ConfidenceImpact::Absolute(1.0)),
            );
            trace.finish("manual_override", 1.0);
            return Ok(MeasurementPrediction {
                decision_id: trace.decision_id(),
                garment: garment.to_string(),
                measure_name: measure.to_string(),
                value_cm: value,
                confidence: 1.0,
                method: "manual_override".to_string(),
                tier: None,
                manual_override: true,
                original_value,
                comparison: None,
                attempts: chained.map(|o| o.attempts).unwrap_or_default(),
            });
        }

        let outcome = chained?;
        let comparison = if outcome.tier == Tier::ExternalRule || !self.config.compare_with_external {
            None
        } else {
            match self.rule_function.autofill_measure(garment, measure, profile) {
                Ok(Some(baseline)) => Some(ExternalComparison {
                    value: StepValue::Number(baseline),
                    confidence: DEFAULT_RULE_CONFIDENCE,
                    agrees: (baseline - outcome.value).abs() <= AGREEMENT_TOLERANCE_CM,
                }),
                Ok(None) => None,
                Err(err) => {
                    tracing::warn!(garment, measure, error = %err, "external rule comparison unavailable");
                    trace.add_note(format!("external rule comparison unavailable: {err}"));
                    None
                }
            }
        };
        if let Some(c) = &comparison {
            trace.add_alternative(AlternativeComparison {
                method: Tier::ExternalRule.as_str().to_string(),
                value: c.value.clone(),
                confidence: c.confidence,
                agrees: c.agrees,
            });
        }
        trace.finish(outcome.method.clone(), outcome.confidence);

        Ok(MeasurementPrediction {
            decision_id: trace.decision_id(),
            garment: garment.to_string(),
            measure_name: measure.to_string(),
            value_cm: outcome.value,
            confidence: outcome.confidence,
            method: outcome.method,
            tier: Some(outcome.tier),
            manual_override: false,
            original_value: None,
            comparison,
            attempts: outcome.attempts,
        })
    }
}

/// Records the feature snapshot and derived-field notes.
fn annotate_profile(profile: &Profile, features: &FeatureRecord, trace: &mut ExplanationTrace) {
    for (name, value) in features.schema().names().iter().zip(features.values()) {
        trace.add_feature_contribution(*name, *value);
    }
    for field in profile.derived_fields() {
        match profile.provenance(field) {
            Some(FieldOrigin::DerivedClamped) => trace.add_note(format!("{field} derived and clamped to its bounds")),
            _ => trace.add_note(format!("{field} derived from height and weight")),
        }
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
