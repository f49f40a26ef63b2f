//! Child body profiles.
//!
//! A [`Profile`] can only be produced by [`ProfileNormalizer::normalize`],
//! which guarantees every bounded field lies in range and every measurement
//! required for the profile's gender is present.

mod normalizer;

pub use normalizer::ProfileNormalizer;

use crate::error::{Result, SizewiseError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Gender code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Gender {
    /// "M"
    #[serde(rename = "M")]
    Male,
    /// "F"
    #[serde(rename = "F")]
    Female,
}

impl Gender {
    /// Parses "M"/"F" (case-insensitive, surrounding whitespace ignored).
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedGender` for anything else.
    pub fn parse(code: &str) -> Result<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "M" => Ok(Self::Male),
            "F" => Ok(Self::Female),
            _ => Err(SizewiseError::UnsupportedGender(code.to_string())),
        }
    }

    /// One-letter code.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
        }
    }

    /// Measurements every profile of this gender carries after normalization,
    /// in derivation order.
    #[must_use]
    pub fn required_measures(self) -> &'static [MeasureField] {
        match self {
            Self::Female => &[
                MeasureField::Shoulder,
                MeasureField::SleeveLength,
                MeasureField::Waist,
                MeasureField::Bust,
                MeasureField::Hip,
            ],
            Self::Male => &[
                MeasureField::Shoulder,
                MeasureField::SleeveLength,
                MeasureField::Waist,
                MeasureField::Chest,
            ],
        }
    }

    /// Whether a user may supply `field` for this gender.
    #[must_use]
    pub fn accepts(self, field: MeasureField) -> bool {
        match field {
            MeasureField::TopLength => true,
            MeasureField::SkirtLength => self == Self::Female,
            other => self.required_measures().contains(&other),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Body measurement fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MeasureField {
    /// Bust girth (F)
    #[serde(rename = "bust_cm")]
    Bust,
    /// Chest girth (M)
    #[serde(rename = "chest_cm")]
    Chest,
    /// Waist girth
    #[serde(rename = "waist_cm")]
    Waist,
    /// Hip girth (F)
    #[serde(rename = "hip_cm")]
    Hip,
    /// Shoulder width
    #[serde(rename = "shoulder_cm")]
    Shoulder,
    /// Sleeve length
    #[serde(rename = "sleeve_length_cm")]
    SleeveLength,
    /// Top length (optional)
    #[serde(rename = "top_length_cm")]
    TopLength,
    /// Skirt length (optional, F)
    #[serde(rename = "skirt_length_cm")]
    SkirtLength,
}

impl MeasureField {
    /// Every field.
    pub const ALL: [Self; 8] = [
        Self::Bust,
        Self::Chest,
        Self::Waist,
        Self::Hip,
        Self::Shoulder,
        Self::SleeveLength,
        Self::TopLength,
        Self::SkirtLength,
    ];

    /// Wire name, e.g. `"waist_cm"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bust => "bust_cm",
            Self::Chest => "chest_cm",
            Self::Waist => "waist_cm",
            Self::Hip => "hip_cm",
            Self::Shoulder => "shoulder_cm",
            Self::SleeveLength => "sleeve_length_cm",
            Self::TopLength => "top_length_cm",
            Self::SkirtLength => "skirt_length_cm",
        }
    }

    /// Parses a wire name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for unknown names.
    pub fn parse(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == name)
            .ok_or_else(|| SizewiseError::InvalidInput(format!("unknown measurement field {name:?}")))
    }
}

impl fmt::Display for MeasureField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a profile measurement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOrigin {
    /// Entered by the user
    UserSupplied,
    /// Computed from height/weight/age
    Derived,
    /// Computed, then clamped into its bounds
    DerivedClamped,
}

impl FieldOrigin {
    /// True for either derived variant.
    #[must_use]
    pub fn is_derived(self) -> bool {
        !matches!(self, Self::UserSupplied)
    }
}

/// Preferred garment fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitPreference {
    /// One size down (age ≥ 10 only)
    Snug,
    /// No adjustment
    #[default]
    Standard,
    /// One size up
    Loose,
}

impl FitPreference {
    /// Parses "snug"/"standard"/"loose" (case-insensitive); `None` is standard.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for unknown values.
    pub fn parse(value: Option<&str>) -> Result<Self> {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(Self::Standard),
            Some(v) => match v.as_str() {
                "" | "standard" => Ok(Self::Standard),
                "snug" => Ok(Self::Snug),
                "loose" => Ok(Self::Loose),
                _ => Err(SizewiseError::InvalidInput(format!(
                    "unknown fit preference {v:?}"
                ))),
            },
        }
    }
}

/// Coarse body-shape descriptor used for girth ease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyShape {
    /// Narrower than average
    Slim,
    /// Average
    Average,
    /// Fuller build (boys)
    Stocky,
    /// Fuller build (girls)
    Curvy,
}

impl BodyShape {
    /// Parses a descriptor valid for `gender`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for unknown values or shapes of the other gender.
    pub fn parse(value: &str, gender: Gender) -> Result<Self> {
        let shape = match value.trim().to_ascii_lowercase().as_str() {
            "slim" => Self::Slim,
            "average" => Self::Average,
            "stocky" => Self::Stocky,
            "curvy" => Self::Curvy,
            other => {
                return Err(SizewiseError::InvalidInput(format!(
                    "unknown body shape {other:?}"
                )))
            }
        };
        match (shape, gender) {
            (Self::Stocky, Gender::Female) | (Self::Curvy, Gender::Male) => Err(
                SizewiseError::InvalidInput(format!("body shape {value:?} is not defined for {gender}")),
            ),
            _ => Ok(shape),
        }
    }

    /// True for the fuller-build variants.
    #[must_use]
    pub fn is_full(self) -> bool {
        matches!(self, Self::Stocky | Self::Curvy)
    }
}

/// Fixed age bands used by balancing and banded garment rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgeBand {
    /// 3–6
    EarlyChildhood,
    /// 7–10
    MiddleChildhood,
    /// 11–14
    EarlyTeen,
    /// 15–18
    LateTeen,
}

impl AgeBand {
    /// All bands, youngest first.
    pub const ALL: [Self; 4] = [
        Self::EarlyChildhood,
        Self::MiddleChildhood,
        Self::EarlyTeen,
        Self::LateTeen,
    ];

    /// Band for an age; ages below 3 map to the first band, above 18 to the last.
    #[must_use]
    pub fn from_age(age: u8) -> Self {
        match age {
            0..=6 => Self::EarlyChildhood,
            7..=10 => Self::MiddleChildhood,
            11..=14 => Self::EarlyTeen,
            _ => Self::LateTeen,
        }
    }

    /// Position in [`AgeBand::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Human-readable range.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::EarlyChildhood => "3-6",
            Self::MiddleChildhood => "7-10",
            Self::EarlyTeen => "11-14",
            Self::LateTeen => "15-18",
        }
    }
}

/// Raw, unvalidated profile input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawProfileInput {
    /// "M" or "F"
    pub gender: String,
    /// Whole years
    pub age: i32,
    /// Height (cm)
    pub height_cm: f32,
    /// Weight (kg)
    pub weight_kg: f32,
    /// Zero or more user-supplied measurements
    #[serde(default)]
    pub measurements: BTreeMap<MeasureField, f32>,
    /// "snug" | "standard" | "loose"
    #[serde(default)]
    pub fit_preference: Option<String>,
    /// "slim" | "average" | "stocky" | "curvy"
    #[serde(default)]
    pub body_shape: Option<String>,
}

impl RawProfileInput {
    /// Minimal input with no measurements.
    #[must_use]
    pub fn new(gender: &str, age: i32, height_cm: f32, weight_kg: f32) -> Self {
        Self {
            gender: gender.to_string(),
            age,
            height_cm,
            weight_kg,
            ..Self::default()
        }
    }

    /// Adds a user-supplied measurement.
    #[must_use]
    pub fn with_measurement(mut self, field: MeasureField, value: f32) -> Self {
        self.measurements.insert(field, value);
        self
    }

    /// Sets the fit preference.
    #[must_use]
    pub fn with_fit_preference(mut self, preference: &str) -> Self {
        self.fit_preference = Some(preference.to_string());
        self
    }

    /// Sets the body shape.
    #[must_use]
    pub fn with_body_shape(mut self, shape: &str) -> Self {
        self.body_shape = Some(shape.to_string());
        self
    }
}

/// A validated, measurement-complete profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    gender: Gender,
    age: u8,
    height_cm: f32,
    weight_kg: f32,
    fit_preference: FitPreference,
    body_shape: Option<BodyShape>,
    measurements: BTreeMap<MeasureField, f32>,
    origins: BTreeMap<MeasureField, FieldOrigin>,
}

impl Profile {
    /// Gender.
    #[must_use]
    pub fn gender(&self) -> Gender {
        self.gender
    }

    /// Age in whole years.
    #[must_use]
    pub fn age(&self) -> u8 {
        self.age
    }

    /// Height (cm).
    #[must_use]
    pub fn height_cm(&self) -> f32 {
        self.height_cm
    }

    /// Weight (kg).
    #[must_use]
    pub fn weight_kg(&self) -> f32 {
        self.weight_kg
    }

    /// Fit preference.
    #[must_use]
    pub fn fit_preference(&self) -> FitPreference {
        self.fit_preference
    }

    /// Body shape, if supplied.
    #[must_use]
    pub fn body_shape(&self) -> Option<BodyShape> {
        self.body_shape
    }

    /// Age band.
    #[must_use]
    pub fn age_band(&self) -> AgeBand {
        AgeBand::from_age(self.age)
    }

    /// Measurement value, if the profile carries it.
    #[must_use]
    pub fn measure(&self, field: MeasureField) -> Option<f32> {
        self.measurements.get(&field).copied()
    }

    /// Origin of a measurement.
    #[must_use]
    pub fn provenance(&self, field: MeasureField) -> Option<FieldOrigin> {
        self.origins.get(&field).copied()
    }

    /// Fields that were derived rather than supplied.
    #[must_use]
    pub fn derived_fields(&self) -> Vec<MeasureField> {
        self.origins
            .iter()
            .filter(|(_, origin)| origin.is_derived())
            .map(|(field, _)| *field)
            .collect()
    }

    /// All measurements.
    #[must_use]
    pub fn measurements(&self) -> &BTreeMap<MeasureField, f32> {
        &self.measurements
    }

    /// Upper-body girth: bust for girls, chest for boys.
    #[must_use]
    pub fn upper_girth(&self) -> Option<f32> {
        match self.gender {
            Gender::Female => self.measure(MeasureField::Bust),
            Gender::Male => self.measure(MeasureField::Chest),
        }
    }

    /// Body-mass index.
    #[must_use]
    pub fn bmi(&self) -> f32 {
        let metres = self.height_cm / 100.0;
        self.weight_kg / (metres * metres)
    }

    /// Height divided by weight.
    #[must_use]
    pub fn height_weight_ratio(&self) -> f32 {
        self.height_cm / self.weight_kg
    }

    /// `age × height / 100`.
    #[must_use]
    pub fn age_height_interaction(&self) -> f32 {
        f32::from(self.age) * self.height_cm / 100.0
    }

    /// Returns a copy with a different fit preference.
    #[must_use]
    pub fn with_fit_preference(mut self, preference: FitPreference) -> Self {
        self.fit_preference = preference;
        self
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
