//! Sizewise: anthropometric inference for school-uniform sizing in pure Rust.
//!
//! Sizewise recommends a garment size code and per-garment measurements
//! for a child from sparse inputs (gender, age, height, weight and any body
//! measurements at hand). Every decision carries a method tag, a confidence
//! and a replayable explanation trace.
//!
//! # Quick Start
//!
//! ```
//! use sizewise::prelude::*;
//!
//! let engine = Engine::new(EngineConfig::default(), Collaborators::in_memory(Vec::new())).unwrap();
//! let profile = engine
//!     .normalize(&RawProfileInput::new("F", 13, 152.0, 44.0))
//!     .unwrap();
//!
//! // No trained models yet: the size falls through to the girth chart.
//! let size = engine.recommend_size(&profile, None).unwrap();
//! assert_eq!(size.tier, Tier::GarmentRule);
//! assert!(size.confidence <= 1.0);
//!
//! // Skirt waist comes from a deterministic ease rule.
//! let waist = engine.predict_measurement("girls_skirt", "waist_cm", &profile, None).unwrap();
//! assert!(waist.value_cm > profile.measure(MeasureField::Waist).unwrap());
//! ```
//!
//! # Modules
//!
//! - [`primitives`]: Core Vector and Matrix types
//! - [`linear_model`], [`tree`], [`classification`]: Estimators (OLS, ridge, forests, softmax)
//! - [`calibration`]: Temperature scaling and calibration error
//! - [`metrics`]: Evaluation metrics
//! - [`model_selection`]: Cross-validation and stratified splitting
//! - [`preprocessing`]: Feature scaling
//! - [`profile`]: Input validation and measurement derivation
//! - [`features`]: Fixed-schema feature records
//! - [`dataset`]: Training corpora, sample weighting and balancing
//! - [`regression_bank`]: Per-garment measurement regressors
//! - [`size_classifier`]: Calibrated per-gender size ensembles
//! - [`rules`]: Garment rules, generic ratios and age-only tables
//! - [`policy`]: Fallback chains with confidence degradation
//! - [`explain`]: Explanation traces and the recorder
//! - [`registry`]: Versioned, checksummed model storage
//! - [`collaborators`]: Interfaces to data sources, lookups and catalogs
//! - [`engine`]: Training pipelines and inference entry points
//! - [`telemetry`]: Log subscriber setup

pub mod calibration;
pub mod classification;
pub mod collaborators;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod explain;
pub mod features;
pub mod linear_model;
pub mod metrics;
pub mod model_selection;
pub mod policy;
pub mod prelude;
pub mod preprocessing;
pub mod primitives;
pub mod profile;
pub mod registry;
pub mod regression_bank;
pub mod rules;
pub mod size_classifier;
pub mod telemetry;
pub mod traits;
pub mod tree;

pub use error::{Result, SizewiseError};
pub use primitives::{Matrix, Vector};
pub use traits::{Classifier, Estimator, Transformer};
