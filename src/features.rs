//! Fixed-schema feature records.
//!
//! Column order is part of the model format: a model trained on one schema
//! is only ever fed records of the same schema.
//!
//! | idx | size schema              | measurement schema       |
//! |-----|--------------------------|--------------------------|
//! | 0   | is_female                | is_female                |
//! | 1   | age                      | age                      |
//! | 2   | height_cm                | height_cm                |
//! | 3   | weight_kg                | weight_kg                |
//! | 4   | bmi                      | bmi                      |
//! | 5   | height_weight_ratio      | height_weight_ratio      |
//! | 6   | age_height_interaction   | age_height_interaction   |
//! | 7   |                          | upper_girth_cm           |
//! | 8   |                          | waist_cm                 |
//! | 9   |                          | shoulder_cm              |
//! | 10  |                          | sleeve_length_cm         |
//! | 11  |                          | hip_cm (0 for boys)      |

use crate::error::{Result, SizewiseError};
use crate::primitives::Matrix;
use crate::profile::{Gender, MeasureField, Profile};
use serde::{Deserialize, Serialize};

const SIZE_FEATURES: [&str; 7] = [
    "is_female",
    "age",
    "height_cm",
    "weight_kg",
    "bmi",
    "height_weight_ratio",
    "age_height_interaction",
];

const MEASUREMENT_FEATURES: [&str; 12] = [
    "is_female",
    "age",
    "height_cm",
    "weight_kg",
    "bmi",
    "height_weight_ratio",
    "age_height_interaction",
    "upper_girth_cm",
    "waist_cm",
    "shoulder_cm",
    "sleeve_length_cm",
    "hip_cm",
];

/// Which column layout a record uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureSchema {
    /// Inputs to the size classifier
    Size,
    /// Inputs to the measurement regressors
    Measurement,
}

impl FeatureSchema {
    /// Column names in order.
    #[must_use]
    pub fn names(self) -> &'static [&'static str] {
        match self {
            Self::Size => &SIZE_FEATURES,
            Self::Measurement => &MEASUREMENT_FEATURES,
        }
    }

    /// Number of columns.
    #[must_use]
    pub fn len(self) -> usize {
        self.names().len()
    }
}

/// One row of model input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    schema: FeatureSchema,
    values: Vec<f32>,
}

impl FeatureRecord {
    /// Size-classifier features for a profile.
    #[must_use]
    pub fn for_size(profile: &Profile) -> Self {
        Self {
            schema: FeatureSchema::Size,
            values: base_values(profile).to_vec(),
        }
    }

    /// Regression features for a profile.
    ///
    /// Normalized profiles always carry the girths used here; a missing
    /// value would only come from a hand-built profile and reads as 0.
    #[must_use]
    pub fn for_measurement(profile: &Profile) -> Self {
        let mut values = base_values(profile).to_vec();
        let get = |field| profile.measure(field).unwrap_or(0.0);
        values.extend([
            profile.upper_girth().unwrap_or(0.0),
            get(MeasureField::Waist),
            get(MeasureField::Shoulder),
            get(MeasureField::SleeveLength),
            get(MeasureField::Hip),
        ]);
        Self {
            schema: FeatureSchema::Measurement,
            values,
        }
    }

    /// Rebuilds a record from raw column values.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the length does not match the schema or a
    /// value is not finite.
    pub fn from_values(schema: FeatureSchema, values: Vec<f32>) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(SizewiseError::InvalidInput(format!(
                "{schema:?} schema has {} columns, got {}",
                schema.len(),
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(SizewiseError::InvalidInput("feature values must be finite".into()));
        }
        Ok(Self { schema, values })
    }

    /// Column layout.
    #[must_use]
    pub fn schema(&self) -> FeatureSchema {
        self.schema
    }

    /// Column values.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Value of a named column.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f32> {
        self.schema
            .names()
            .iter()
            .position(|n| *n == name)
            .map(|idx| self.values[idx])
    }

    /// Gender encoded in column 0.
    #[must_use]
    pub fn gender(&self) -> Gender {
        if self.values[0] >= 0.5 {
            Gender::Female
        } else {
            Gender::Male
        }
    }

    /// Age column rounded to whole years.
    #[must_use]
    pub fn age(&self) -> u8 {
        self.values[1].round().clamp(0.0, f32::from(u8::MAX)) as u8
    }
}

fn base_values(profile: &Profile) -> [f32; 7] {
    [
        if profile.gender() == Gender::Female { 1.0 } else { 0.0 },
        f32::from(profile.age()),
        profile.height_cm(),
        profile.weight_kg(),
        profile.bmi(),
        profile.height_weight_ratio(),
        profile.age_height_interaction(),
    ]
}

/// Stacks records of one schema into a design matrix.
///
/// # Errors
///
/// Returns `InvalidInput` when `records` is empty or mixes schemas.
pub fn design_matrix(records: &[&FeatureRecord]) -> Result<Matrix<f32>> {
    let first = records
        .first()
        .ok_or_else(|| SizewiseError::InvalidInput("no feature records".into()))?;
    let schema = first.schema;
    let mut data = Vec::with_capacity(records.len() * schema.len());
    for record in records {
        if record.schema != schema {
            return Err(SizewiseError::InvalidInput("mixed feature schemas".into()));
        }
        data.extend_from_slice(&record.values);
    }
    Ok(Matrix::from_vec(records.len(), schema.len(), data)?)
}
