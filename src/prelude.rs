//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use sizewise::prelude::*;
//! ```

pub use crate::primitives::{Matrix, Vector};
pub use crate::traits::{Classifier, Estimator, Transformer};
pub use crate::linear_model::LinearRegression;
pub use crate::metrics::{mse, r_squared};

pub use crate::config::EngineConfig;
pub use crate::engine::{Collaborators, Engine, TrainingReport, TrainingStatus};
pub use crate::error::{Result, SizewiseError};
pub use crate::explain::{DecisionType, ExplanationStep, ExplanationTrace};
pub use crate::policy::{MeasurementPrediction, SizeRecommendation, Tier};
pub use crate::profile::{Gender, MeasureField, Profile, ProfileNormalizer, RawProfileInput};
