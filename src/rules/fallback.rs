//! Low-tier fallbacks: generic anthropometric ratios and age-only tables.

use super::{body_value, chart_lookup, upper_girth, RuleOutcome, RuleSize};
use crate::config::RuleConfig;
use crate::error::{Result, SizewiseError};
use crate::explain::{ConfidenceImpact, ExplanationStep};
use crate::profile::{Gender, MeasureField, Profile};

const HEIGHT_SIZE_CHART: [(f32, &str); 6] = [
    (105.0, "small-"),
    (118.0, "small"),
    (130.0, "small+"),
    (140.0, "medium"),
    (150.0, "medium+"),
    (160.0, "large"),
];

/// Measure families every garment shares.
#[derive(Debug, Clone, Copy, PartialEq)]
enum GenericMeasure {
    UpperGirth,
    Waist,
    Hip,
    Shoulder,
    Sleeve,
    Length,
}

impl GenericMeasure {
    fn parse(measure: &str) -> Option<Self> {
        Some(match measure {
            "chest_cm" | "bust_cm" => Self::UpperGirth,
            "waist_cm" => Self::Waist,
            "hip_cm" => Self::Hip,
            "shoulder_cm" => Self::Shoulder,
            "sleeve_length_cm" | "sleeve_cm" => Self::Sleeve,
            "length_cm" => Self::Length,
            _ => return None,
        })
    }

    fn is_girth(self) -> bool {
        matches!(self, Self::UpperGirth | Self::Waist | Self::Hip)
    }
}

fn no_rule(garment: &str, measure: &str) -> SizewiseError {
    SizewiseError::NoRule {
        garment: garment.to_string(),
        measure: measure.to_string(),
    }
}

/// Garment-agnostic ratios: girth plus ease, length from height.
#[derive(Debug, Clone, Default)]
pub struct GenericAnthropometricRule {
    config: RuleConfig,
}

impl GenericAnthropometricRule {
    /// Creates the rule.
    #[must_use]
    pub fn new(config: RuleConfig) -> Self {
        Self { config }
    }

    /// Computes any measure in the generic family for any garment.
    ///
    /// # Errors
    ///
    /// `NoRule` for measures outside the family, or `hip_cm` for boys.
    pub fn compute(&self, garment: &str, measure: &str, profile: &Profile) -> Result<RuleOutcome> {
        let kind = GenericMeasure::parse(measure).ok_or_else(|| no_rule(garment, measure))?;
        let c = &self.config;
        let (body, value, reasoning) = match kind {
            GenericMeasure::UpperGirth => {
                let body = upper_girth(profile)?;
                (body, body + c.generic_girth_ease, "upper girth plus generic ease")
            }
            GenericMeasure::Waist => {
                let body = body_value(profile, MeasureField::Waist)?;
                (body, body + c.generic_girth_ease, "waist plus generic ease")
            }
            GenericMeasure::Hip => {
                if profile.gender() == Gender::Male {
                    return Err(no_rule(garment, measure));
                }
                let body = body_value(profile, MeasureField::Hip)?;
                (body, body + c.generic_girth_ease, "hip plus generic ease")
            }
            GenericMeasure::Shoulder => {
                let body = body_value(profile, MeasureField::Shoulder)?;
                (body, body, "body shoulder width")
            }
            GenericMeasure::Sleeve => {
                let body = body_value(profile, MeasureField::SleeveLength)?;
                (body, body, "body sleeve length")
            }
            GenericMeasure::Length => {
                let height = profile.height_cm();
                (height, height * c.generic_length_ratio, "height times generic length ratio")
            }
        };

        Ok(RuleOutcome {
            garment: garment.to_string(),
            measure: measure.to_string(),
            value_cm: value,
            confidence: c.generic_confidence,
            rule: "generic_anthropometric".to_string(),
            steps: vec![ExplanationStep::new("generic_anthropometric_rule")
                .input("body_value", body)
                .input("girth", kind.is_girth())
                .output(value)
                .reasoning(reasoning)
                .impact(ConfidenceImpact::Absolute(c.generic_confidence))],
        })
    }

    /// Size code from the height chart.
    #[must_use]
    pub fn size_from_height(&self, profile: &Profile) -> RuleSize {
        let height = profile.height_cm();
        let code = chart_lookup(&HEIGHT_SIZE_CHART, "large+", height);
        let confidence = self.config.generic_confidence;
        RuleSize {
            size_code: code.to_string(),
            confidence,
            rule: "height_size_chart".to_string(),
            steps: vec![ExplanationStep::new("height_size_chart")
                .input("height_cm", height)
                .output(code)
                .reasoning("size chart by height")
                .impact(ConfidenceImpact::Absolute(confidence))],
        }
    }
}

/// Typical body of children in an age bracket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeBracket {
    /// Youngest age in the bracket
    pub min_age: u8,
    /// Typical size
    pub size_code: &'static str,
    /// Typical height (cm)
    pub height_cm: f32,
    /// Typical chest/bust (cm)
    pub upper_girth_cm: f32,
    /// Typical waist (cm)
    pub waist_cm: f32,
    /// Typical hip (cm)
    pub hip_cm: f32,
    /// Typical shoulder width (cm)
    pub shoulder_cm: f32,
    /// Typical sleeve length (cm)
    pub sleeve_length_cm: f32,
}

/// Oldest bracket last.
static AGE_TABLE: [AgeBracket; 7] = [
    AgeBracket {
        min_age: 0,
        size_code: "small-",
        height_cm: 100.0,
        upper_girth_cm: 54.0,
        waist_cm: 51.0,
        hip_cm: 56.0,
        shoulder_cm: 26.0,
        sleeve_length_cm: 32.0,
    },
    AgeBracket {
        min_age: 5,
        size_code: "small",
        height_cm: 114.0,
        upper_girth_cm: 58.0,
        waist_cm: 53.0,
        hip_cm: 60.0,
        shoulder_cm: 28.0,
        sleeve_length_cm: 36.0,
    },
    AgeBracket {
        min_age: 7,
        size_code: "small+",
        height_cm: 126.0,
        upper_girth_cm: 62.0,
        waist_cm: 55.0,
        hip_cm: 65.0,
        shoulder_cm: 30.0,
        sleeve_length_cm: 40.0,
    },
    AgeBracket {
        min_age: 9,
        size_code: "medium",
        height_cm: 137.0,
        upper_girth_cm: 67.0,
        waist_cm: 58.0,
        hip_cm: 71.0,
        shoulder_cm: 32.0,
        sleeve_length_cm: 44.0,
    },
    AgeBracket {
        min_age: 11,
        size_code: "medium+",
        height_cm: 149.0,
        upper_girth_cm: 73.0,
        waist_cm: 61.0,
        hip_cm: 78.0,
        shoulder_cm: 35.0,
        sleeve_length_cm: 48.0,
    },
    AgeBracket {
        min_age: 13,
        size_code: "large",
        height_cm: 159.0,
        upper_girth_cm: 80.0,
        waist_cm: 65.0,
        hip_cm: 85.0,
        shoulder_cm: 38.0,
        sleeve_length_cm: 52.0,
    },
    AgeBracket {
        min_age: 15,
        size_code: "large+",
        height_cm: 167.0,
        upper_girth_cm: 86.0,
        waist_cm: 69.0,
        hip_cm: 91.0,
        shoulder_cm: 41.0,
        sleeve_length_cm: 55.0,
    },
];

/// Last-resort estimates from age alone.
#[derive(Debug, Clone, Default)]
pub struct AgeOnlyHeuristic {
    config: RuleConfig,
}

impl AgeOnlyHeuristic {
    /// Creates the heuristic.
    #[must_use]
    pub fn new(config: RuleConfig) -> Self {
        Self { config }
    }

    /// Bracket containing `age`.
    #[must_use]
    pub fn bracket(age: u8) -> &'static AgeBracket {
        AGE_TABLE
            .iter()
            .rev()
            .find(|b| age >= b.min_age)
            .unwrap_or(&AGE_TABLE[0])
    }

    /// Typical size for the profile's age.
    #[must_use]
    pub fn size(&self, profile: &Profile) -> RuleSize {
        let bracket = Self::bracket(profile.age());
        let confidence = self.config.age_only_confidence;
        RuleSize {
            size_code: bracket.size_code.to_string(),
            confidence,
            rule: "age_only".to_string(),
            steps: vec![ExplanationStep::new("age_only_size")
                .input("age", profile.age())
                .output(bracket.size_code)
                .reasoning("typical size for the age")
                .impact(ConfidenceImpact::Absolute(confidence))],
        }
    }

    /// Typical garment measure for the profile's age.
    ///
    /// # Errors
    ///
    /// `NoRule` for measures outside the generic family.
    pub fn compute(&self, garment: &str, measure: &str, profile: &Profile) -> Result<RuleOutcome> {
        let kind = GenericMeasure::parse(measure).ok_or_else(|| no_rule(garment, measure))?;
        let b = Self::bracket(profile.age());
        let ease = self.config.generic_girth_ease;
        let value = match kind {
            GenericMeasure::UpperGirth => b.upper_girth_cm + ease,
            GenericMeasure::Waist => b.waist_cm + ease,
            GenericMeasure::Hip => b.hip_cm + ease,
            GenericMeasure::Shoulder => b.shoulder_cm,
            GenericMeasure::Sleeve => b.sleeve_length_cm,
            GenericMeasure::Length => b.height_cm * self.config.generic_length_ratio,
        };
        let confidence = self.config.age_only_confidence;
        Ok(RuleOutcome {
            garment: garment.to_string(),
            measure: measure.to_string(),
            value_cm: value,
            confidence,
            rule: "age_only".to_string(),
            steps: vec![ExplanationStep::new("age_only_measure")
                .input("age", profile.age())
                .input("bracket_min_age", b.min_age)
                .output(value)
                .reasoning("typical body for the age bracket")
                .impact(ConfidenceImpact::Absolute(confidence))],
        })
    }
}
