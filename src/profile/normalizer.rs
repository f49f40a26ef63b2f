//! Input validation and measurement derivation.

use super::{BodyShape, FieldOrigin, FitPreference, Gender, MeasureField, Profile, RawProfileInput};
use crate::config::{Bounds, DerivationCoefficients, NormalizerConfig};
use crate::error::{Result, SizewiseError};
use std::collections::BTreeMap;

/// Validates raw input and backfills missing measurements.
///
/// Derived values are linear in height and weight with a puberty term for
/// bust and hip, then clamped to the field's bounds. User-supplied values
/// are never clamped: out-of-range input is a `BoundsViolation`.
///
/// # Examples
///
/// ```
/// use sizewise::config::NormalizerConfig;
/// use sizewise::profile::{FieldOrigin, MeasureField, ProfileNormalizer, RawProfileInput};
///
/// let normalizer = ProfileNormalizer::new(NormalizerConfig::default());
/// let profile = normalizer
///     .normalize(&RawProfileInput::new("F", 13, 152.0, 44.0))
///     .expect("valid profile");
/// assert!(profile.measure(MeasureField::Hip).is_some());
/// assert_eq!(profile.provenance(MeasureField::Waist), Some(FieldOrigin::Derived));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProfileNormalizer {
    config: NormalizerConfig,
}

impl ProfileNormalizer {
    /// Creates a normalizer.
    #[must_use]
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Declared bounds of a measurement field.
    #[must_use]
    pub fn bounds(&self, field: MeasureField) -> Bounds {
        let c = &self.config;
        match field {
            MeasureField::Bust => c.bust_cm,
            MeasureField::Chest => c.chest_cm,
            MeasureField::Waist => c.waist_cm,
            MeasureField::Hip => c.hip_cm,
            MeasureField::Shoulder => c.shoulder_cm,
            MeasureField::SleeveLength => c.sleeve_length_cm,
            MeasureField::TopLength => c.top_length_cm,
            MeasureField::SkirtLength => c.skirt_length_cm,
        }
    }

    fn coefficients(&self, gender: Gender, field: MeasureField) -> Option<DerivationCoefficients> {
        let c = &self.config;
        match (gender, field) {
            (_, MeasureField::Shoulder) => Some(c.shoulder),
            (_, MeasureField::SleeveLength) => Some(c.sleeve_length),
            (Gender::Female, MeasureField::Waist) => Some(c.female_waist),
            (Gender::Male, MeasureField::Waist) => Some(c.male_waist),
            (Gender::Female, MeasureField::Bust) => Some(c.female_bust),
            (Gender::Female, MeasureField::Hip) => Some(c.female_hip),
            (Gender::Male, MeasureField::Chest) => Some(c.male_chest),
            _ => None,
        }
    }

    /// Validates `input` and returns a measurement-complete profile.
    ///
    /// # Errors
    ///
    /// - `UnsupportedGender` for gender codes outside {M, F}
    /// - `BoundsViolation` naming the field and range for out-of-range input,
    ///   including the age plausibility gates
    /// - `InvalidInput` for non-finite numbers, unknown fit preferences or
    ///   body shapes, and measurements supplied for the other gender
    pub fn normalize(&self, input: &RawProfileInput) -> Result<Profile> {
        let gender = Gender::parse(&input.gender)?;

        check_bounds("age", input.age as f32, self.config.age)?;
        let age = u8::try_from(input.age)
            .map_err(|_| SizewiseError::InvalidInput(format!("age {} is not representable", input.age)))?;
        check_finite("height_cm", input.height_cm)?;
        check_finite("weight_kg", input.weight_kg)?;
        check_bounds("height_cm", input.height_cm, self.config.height_cm)?;
        check_bounds("weight_kg", input.weight_kg, self.config.weight_kg)?;
        self.check_age_gates(age, input.height_cm, input.weight_kg)?;

        let fit_preference = FitPreference::parse(input.fit_preference.as_deref())?;
        let body_shape = input
            .body_shape
            .as_deref()
            .map(|shape| BodyShape::parse(shape, gender))
            .transpose()?;

        let mut measurements = BTreeMap::new();
        let mut origins = BTreeMap::new();
        for (&field, &value) in &input.measurements {
            if !gender.accepts(field) {
                return Err(SizewiseError::InvalidInput(format!(
                    "{field} is not a measurement for gender {gender}"
                )));
            }
            check_finite(field.as_str(), value)?;
            check_bounds(field.as_str(), value, self.bounds(field))?;
            measurements.insert(field, value);
            origins.insert(field, FieldOrigin::UserSupplied);
        }

        for &field in gender.required_measures() {
            if measurements.contains_key(&field) {
                continue;
            }
            let Some(coeffs) = self.coefficients(gender, field) else {
                continue;
            };
            let raw = coeffs.evaluate(age, input.height_cm, input.weight_kg);
            let bounds = self.bounds(field);
            let value = bounds.clamp(raw);
            let origin = if bounds.contains(raw) {
                FieldOrigin::Derived
            } else {
                tracing::debug!(field = field.as_str(), raw, value, "derived measurement clamped");
                FieldOrigin::DerivedClamped
            };
            measurements.insert(field, value);
            origins.insert(field, origin);
        }

        Ok(Profile {
            gender,
            age,
            height_cm: input.height_cm,
            weight_kg: input.weight_kg,
            fit_preference,
            body_shape,
            measurements,
            origins,
        })
    }

    fn check_age_gates(&self, age: u8, height_cm: f32, weight_kg: f32) -> Result<()> {
        let mut gates = self.config.age_gates.clone();
        gates.sort_by_key(|g| g.max_age);
        for gate in gates.iter().filter(|g| age <= g.max_age) {
            check_bounds(
                "height_cm",
                height_cm,
                Bounds::new(self.config.height_cm.min, gate.max_height_cm),
            )?;
            check_bounds(
                "weight_kg",
                weight_kg,
                Bounds::new(self.config.weight_kg.min, gate.max_weight_kg),
            )?;
        }
        Ok(())
    }
}

fn check_finite(field: &str, value: f32) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SizewiseError::InvalidInput(format!("{field} must be finite, got {value}")))
    }
}

fn check_bounds(field: &str, value: f32, bounds: Bounds) -> Result<()> {
    if bounds.contains(value) {
        Ok(())
    } else {
        Err(SizewiseError::BoundsViolation {
            field: field.to_string(),
            value,
            min: bounds.min,
            max: bounds.max,
        })
    }
}
