//! Error types for sizewise operations.
//!
//! The taxonomy separates conditions that demote a decision to the next
//! fallback tier from conditions that must stop the caller.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SizewiseError>;

/// Main error type for sizewise operations.
///
/// # Examples
///
/// ```
/// use sizewise::error::SizewiseError;
///
/// let err = SizewiseError::BoundsViolation {
///     field: "height_cm".to_string(),
///     value: 300.0,
///     min: 80.0,
///     max: 250.0,
/// };
/// assert!(err.to_string().contains("height_cm"));
/// ```
#[derive(Error, Debug)]
pub enum SizewiseError {
    /// A bounded physical input lies outside its declared range.
    #[error("bounds violation: {field} = {value} outside [{min}, {max}]")]
    BoundsViolation {
        /// Offending field name
        field: String,
        /// Supplied value
        value: f32,
        /// Lower bound (inclusive)
        min: f32,
        /// Upper bound (inclusive)
        max: f32,
    },

    /// Gender code outside {M, F}; no derivation path exists.
    #[error("unsupported gender {0:?}: expected \"M\" or \"F\"")]
    UnsupportedGender(String),

    /// Malformed input that is not a range problem.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No trained model exists for the requested key.
    #[error("no model for {key}")]
    ModelNotFound {
        /// Model key (e.g. `girls_skirt/waist_cm`)
        key: String,
    },

    /// The registry has no entry under this name.
    #[error("registry has no entry named {name}")]
    RegistryMiss {
        /// Registry name
        name: String,
    },

    /// Stored checksum no longer matches the stored bytes.
    #[error("integrity failure for {name}: expected checksum {expected}, found {actual}")]
    IntegrityError {
        /// Registry name
        name: String,
        /// Checksum recorded at save time
        expected: String,
        /// Checksum of the bytes read back
        actual: String,
    },

    /// Too few samples to train a pair or class.
    #[error("insufficient data for {context}: {available} samples, need {required}")]
    InsufficientData {
        /// What was being trained
        context: String,
        /// Samples available
        available: usize,
        /// Samples required
        required: usize,
    },

    /// A collaborator (data source, lookup, persistence) could not serve the call.
    #[error("collaborator {collaborator} unavailable: {reason}")]
    CollaboratorUnavailable {
        /// Collaborator name
        collaborator: String,
        /// Failure reason
        reason: String,
    },

    /// The rule engine has no deterministic rule for this pair.
    #[error("no rule for {garment}/{measure}")]
    NoRule {
        /// Garment code
        garment: String,
        /// Measure name
        measure: String,
    },

    /// Numerical failure inside an estimator.
    #[error("estimator failure: {0}")]
    Estimator(String),

    /// No explanation trace is recorded under this decision id.
    #[error("no explanation recorded for decision {decision_id}")]
    TraceNotFound {
        /// Decision id
        decision_id: String,
    },

    /// Every fallback tier failed.
    #[error("all tiers exhausted for {decision}: {}", attempts.join("; "))]
    AllTiersExhausted {
        /// Decision type
        decision: String,
        /// One reason per attempted tier
        attempts: Vec<String>,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SizewiseError {
    /// Whether the fallback chain may absorb this error and try the next tier.
    ///
    /// Integrity failures are reported as recoverable at inference time so
    /// the corrupted model is skipped, but they are always logged at error
    /// level by the caller.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ModelNotFound { .. }
                | Self::RegistryMiss { .. }
                | Self::IntegrityError { .. }
                | Self::InsufficientData { .. }
                | Self::CollaboratorUnavailable { .. }
                | Self::NoRule { .. }
                | Self::Estimator(_)
        )
    }

    /// Whether this is an expected miss rather than a malfunction.
    ///
    /// Expected misses carry the smaller demotion penalty.
    #[must_use]
    pub fn is_expected_miss(&self) -> bool {
        matches!(
            self,
            Self::ModelNotFound { .. } | Self::RegistryMiss { .. } | Self::NoRule { .. }
        )
    }

    pub(crate) fn estimator(msg: impl Into<String>) -> Self {
        Self::Estimator(msg.into())
    }

    pub(crate) fn unavailable(collaborator: &str, reason: impl Into<String>) -> Self {
        Self::CollaboratorUnavailable {
            collaborator: collaborator.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&str> for SizewiseError {
    fn from(msg: &str) -> Self {
        Self::Estimator(msg.to_string())
    }
}

impl From<serde_json::Error> for SizewiseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for SizewiseError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
