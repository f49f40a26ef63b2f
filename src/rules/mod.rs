//! Deterministic anthropometric rules.
//!
//! [`GarmentRuleEngine`] covers a fixed catalog of garment measures whose
//! values follow from the body with no learned model: ease allowances on
//! girths and height ratios on lengths. Pairs outside the catalog report
//! [`SizewiseError::NoRule`]. The generic and age-only fallbacks live in
//! [`fallback`].

mod fallback;

pub use fallback::{AgeBracket, AgeOnlyHeuristic, GenericAnthropometricRule};

use crate::config::RuleConfig;
use crate::error::{Result, SizewiseError};
use crate::explain::{ConfidenceImpact, ExplanationStep};
use crate::profile::{AgeBand, BodyShape, MeasureField, Profile};
use serde::{Deserialize, Serialize};

/// A rule-computed garment measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    /// Garment code
    pub garment: String,
    /// Garment measure name
    pub measure: String,
    /// Computed value (cm)
    pub value_cm: f32,
    /// Fixed rule confidence
    pub confidence: f32,
    /// Rule identifier, e.g. `skirt_waist_ease`
    pub rule: String,
    /// One step per computation stage
    pub steps: Vec<ExplanationStep>,
}

/// A rule-computed size code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSize {
    /// Size code
    pub size_code: String,
    /// Fixed rule confidence
    pub confidence: f32,
    /// Rule identifier
    pub rule: String,
    /// Computation steps
    pub steps: Vec<ExplanationStep>,
}

/// Upper-girth size chart used by the garment-rule size tier.
///
/// Entries are `(exclusive upper girth bound, size code)`; girths past the
/// last bound map to the largest size.
const GIRTH_SIZE_CHART: [(f32, &str); 6] = [
    (56.0, "small-"),
    (60.0, "small"),
    (64.0, "small+"),
    (69.0, "medium"),
    (75.0, "medium+"),
    (82.0, "large"),
];

pub(crate) fn chart_lookup(chart: &[(f32, &'static str)], largest: &'static str, value: f32) -> &'static str {
    chart
        .iter()
        .find(|(bound, _)| value < *bound)
        .map_or(largest, |(_, code)| *code)
}

pub(crate) fn body_value(profile: &Profile, field: MeasureField) -> Result<f32> {
    profile.measure(field).ok_or_else(|| SizewiseError::InsufficientData {
        context: format!("profile {field}"),
        available: 0,
        required: 1,
    })
}

fn upper_girth(profile: &Profile) -> Result<f32> {
    let field = match profile.gender() {
        crate::profile::Gender::Female => MeasureField::Bust,
        crate::profile::Gender::Male => MeasureField::Chest,
    };
    body_value(profile, field)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Base {
    Waist,
    UpperGirth,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Rule {
    /// Body girth plus a fixed ease and the body-shape adjustment.
    Ease { name: &'static str, base: Base, ease: f32 },
    /// Height times a ratio.
    HeightRatio { name: &'static str, ratio: f32 },
    /// Height times a ratio, shortened for young children.
    YoungShortened { name: &'static str, ratio: f32, factor: f32 },
    /// Height times a ratio times the age-band multiplier.
    Banded { name: &'static str, ratio: f32 },
}

/// Deterministic rules for garment measures with known ease or ratio.
///
/// # Examples
///
/// ```
/// use sizewise::config::RuleConfig;
/// use sizewise::profile::{ProfileNormalizer, RawProfileInput};
/// use sizewise::rules::GarmentRuleEngine;
///
/// let profile = ProfileNormalizer::default()
///     .normalize(&RawProfileInput::new("F", 13, 152.0, 44.0))
///     .expect("valid");
/// let engine = GarmentRuleEngine::new(RuleConfig::default());
/// let outcome = engine.compute("girls_dupatta", "length_cm", &profile).expect("covered");
/// assert!((outcome.value_cm - 182.4).abs() < 1e-3);
/// assert!(engine.compute("girls_bloomers", "waist_cm", &profile).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct GarmentRuleEngine {
    config: RuleConfig,
}

impl GarmentRuleEngine {
    /// Creates the engine.
    #[must_use]
    pub fn new(config: RuleConfig) -> Self {
        Self { config }
    }

    /// Rule constants.
    #[must_use]
    pub fn config(&self) -> &RuleConfig {
        &self.config
    }

    /// Whether a rule exists for the pair.
    #[must_use]
    pub fn covers(&self, garment: &str, measure: &str) -> bool {
        self.rule_for(garment, measure).is_some()
    }

    fn rule_for(&self, garment: &str, measure: &str) -> Option<Rule> {
        let c = &self.config;
        let kind = garment
            .strip_prefix("girls_")
            .or_else(|| garment.strip_prefix("boys_"))
            .unwrap_or(garment);
        let rule = match (kind, measure) {
            ("skirt", "waist_cm") => Rule::Ease {
                name: "skirt_waist_ease",
                base: Base::Waist,
                ease: c.skirt_waist_ease,
            },
            ("skirt", "length_cm") => Rule::Banded {
                name: "skirt_length_banded",
                ratio: c.skirt_length_ratio,
            },
            ("dupatta", "length_cm") => Rule::YoungShortened {
                name: "dupatta_length_ratio",
                ratio: c.dupatta_length_ratio,
                factor: c.dupatta_young_factor,
            },
            ("kurta_top", "length_cm") => Rule::HeightRatio {
                name: "kurta_top_length_ratio",
                ratio: c.kurta_top_length_ratio,
            },
            ("kurta_top", "chest_cm") => Rule::Ease {
                name: "kurta_chest_ease",
                base: Base::UpperGirth,
                ease: c.kurta_chest_ease,
            },
            ("kurta_pant", "waist_cm") | ("formal_pants" | "elastic_pants" | "track_pants", "waist_cm") => Rule::Ease {
                name: "pant_waist_ease",
                base: Base::Waist,
                ease: c.pant_waist_ease,
            },
            ("kurta_pant", "length_cm") => Rule::HeightRatio {
                name: "kurta_pant_length_ratio",
                ratio: c.kurta_pant_length_ratio,
            },
            ("formal_pants" | "elastic_pants" | "track_pants", "length_cm") => Rule::HeightRatio {
                name: "pant_length_ratio",
                ratio: c.pant_length_ratio,
            },
            ("shorts" | "elastic_shorts" | "track_shorts", "length_cm") => Rule::HeightRatio {
                name: "shorts_length_ratio",
                ratio: c.shorts_length_ratio,
            },
            ("formal_shirt_half" | "formal_shirt_full", "chest_cm") => Rule::Ease {
                name: "shirt_chest_ease",
                base: Base::UpperGirth,
                ease: c.shirt_chest_ease,
            },
            ("blazer", "chest_cm") => Rule::Ease {
                name: "blazer_chest_ease",
                base: Base::UpperGirth,
                ease: c.blazer_chest_ease,
            },
            _ => return None,
        };
        Some(rule)
    }

    /// Computes a garment measure.
    ///
    /// # Errors
    ///
    /// `NoRule` if the pair is outside the catalog.
    pub fn compute(&self, garment: &str, measure: &str, profile: &Profile) -> Result<RuleOutcome> {
        let rule = self.rule_for(garment, measure).ok_or_else(|| SizewiseError::NoRule {
            garment: garment.to_string(),
            measure: measure.to_string(),
        })?;

        let mut steps = Vec::new();
        let height = profile.height_cm();
        let (name, value, confidence) = match rule {
            Rule::Ease { name, base, ease } => {
                let (label, body) = match base {
                    Base::Waist => ("waist_cm", body_value(profile, MeasureField::Waist)?),
                    Base::UpperGirth => ("upper_girth_cm", upper_girth(profile)?),
                };
                let shape = self.shape_ease(profile.body_shape());
                steps.push(
                    ExplanationStep::new("ease_allowance")
                        .input(label, body)
                        .input("ease_cm", ease)
                        .input("shape_ease_cm", shape)
                        .output(body + ease + shape)
                        .reasoning(format!("garment {label} = body {label} + {ease} cm ease")),
                );
                (name, body + ease + shape, self.config.ease_rule_confidence)
            }
            Rule::HeightRatio { name, ratio } => {
                steps.push(ratio_step(height, ratio));
                (name, height * ratio, self.config.ratio_rule_confidence)
            }
            Rule::YoungShortened { name, ratio, factor } => {
                steps.push(ratio_step(height, ratio));
                let mut value = height * ratio;
                if profile.age() <= self.config.young_age {
                    value *= factor;
                    steps.push(
                        ExplanationStep::new("young_child_shortening")
                            .input("age", profile.age())
                            .input("factor", factor)
                            .output(value)
                            .reasoning(format!("shortened for age {} and below", self.config.young_age)),
                    );
                }
                (name, value, self.config.ratio_rule_confidence)
            }
            Rule::Banded { name, ratio } => {
                steps.push(ratio_step(height, ratio));
                let band = AgeBand::from_age(profile.age());
                let multiplier = self.config.skirt_band_multipliers[band.index()];
                let value = height * ratio * multiplier;
                steps.push(
                    ExplanationStep::new("age_band_multiplier")
                        .input("age_band", band.label())
                        .input("multiplier", multiplier)
                        .output(value)
                        .reasoning("length scaled for the age band"),
                );
                (name, value, self.config.banded_rule_confidence)
            }
        };

        steps.push(
            ExplanationStep::new("garment_rule")
                .input("garment", garment)
                .input("measure", measure)
                .output(value)
                .reasoning(format!("deterministic rule {name}"))
                .impact(ConfidenceImpact::Absolute(confidence)),
        );
        tracing::debug!(garment, measure, rule = name, value, "rule applied");

        Ok(RuleOutcome {
            garment: garment.to_string(),
            measure: measure.to_string(),
            value_cm: value,
            confidence,
            rule: name.to_string(),
            steps,
        })
    }

    /// Size code from the upper-girth chart.
    ///
    /// # Errors
    ///
    /// `InsufficientData` if the profile lacks its upper girth.
    pub fn size_from_girth(&self, profile: &Profile) -> Result<RuleSize> {
        let girth = upper_girth(profile)?;
        let code = chart_lookup(&GIRTH_SIZE_CHART, "large+", girth);
        let confidence = self.config.banded_rule_confidence;
        Ok(RuleSize {
            size_code: code.to_string(),
            confidence,
            rule: "girth_size_chart".to_string(),
            steps: vec![ExplanationStep::new("girth_size_chart")
                .input("upper_girth_cm", girth)
                .output(code)
                .reasoning("size chart by chest/bust girth")
                .impact(ConfidenceImpact::Absolute(confidence))],
        })
    }

    fn shape_ease(&self, shape: Option<BodyShape>) -> f32 {
        match shape {
            Some(BodyShape::Slim) => self.config.slim_shape_ease,
            Some(s) if s.is_full() => self.config.full_shape_ease,
            _ => 0.0,
        }
    }
}

fn ratio_step(height: f32, ratio: f32) -> ExplanationStep {
    ExplanationStep::new("height_ratio")
        .input("height_cm", height)
        .input("ratio", ratio)
        .output(height * ratio)
}
