//! Candidate regressors compared by cross-validation.

use crate::config::RegressionConfig;
use crate::error::Result;
use crate::linear_model::{LinearRegression, Ridge};
use crate::preprocessing::StandardScaler;
use crate::primitives::{Matrix, Vector};
use crate::traits::{Estimator, Transformer};
use crate::tree::RandomForestRegressor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Regressor family evaluated for a (garment, measure) pair.
///
/// Ordered by simplicity: `Linear` < `Ridge` < `RandomForest`. Ties in CV
/// error go to the simpler candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CandidateModel {
    /// Ordinary least squares
    Linear,
    /// L2-regularized least squares
    Ridge {
        /// Regularization strength
        alpha: f32,
    },
    /// Bagged regression trees
    RandomForest {
        /// Number of trees
        n_estimators: usize,
        /// Depth cap per tree
        max_depth: usize,
        /// Minimum rows per leaf
        min_samples_leaf: usize,
    },
}

impl CandidateModel {
    /// The candidate set for a configuration, simplest first.
    #[must_use]
    pub fn candidates(config: &RegressionConfig) -> Vec<Self> {
        vec![
            Self::Linear,
            Self::Ridge {
                alpha: config.ridge_alpha,
            },
            Self::RandomForest {
                n_estimators: config.forest_trees,
                max_depth: config.forest_max_depth,
                min_samples_leaf: config.forest_min_samples_leaf,
            },
        ]
    }

    /// Position in the simplicity order.
    #[must_use]
    pub fn simplicity_rank(&self) -> u8 {
        match self {
            Self::Linear => 0,
            Self::Ridge { .. } => 1,
            Self::RandomForest { .. } => 2,
        }
    }

    /// Short type tag.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Ridge { .. } => "ridge",
            Self::RandomForest { .. } => "random_forest",
        }
    }

    pub(crate) fn build(&self, random_state: u64) -> ScaledRegressor {
        let regressor = match *self {
            Self::Linear => FittedRegressor::Linear(LinearRegression::new()),
            Self::Ridge { alpha } => FittedRegressor::Ridge(Ridge::new(alpha)),
            Self::RandomForest {
                n_estimators,
                max_depth,
                min_samples_leaf,
            } => FittedRegressor::RandomForest(
                RandomForestRegressor::new(n_estimators)
                    .with_max_depth(max_depth)
                    .with_min_samples_leaf(min_samples_leaf)
                    .with_random_state(random_state),
            ),
        };
        ScaledRegressor {
            scaler: StandardScaler::new(),
            regressor,
        }
    }
}

impl fmt::Display for CandidateModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Ridge { alpha } => write!(f, "ridge(alpha={alpha})"),
            Self::RandomForest {
                n_estimators,
                max_depth,
                ..
            } => write!(f, "random_forest(trees={n_estimators}, depth={max_depth})"),
        }
    }
}

/// A fitted regressor of one of the candidate families.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FittedRegressor {
    /// OLS
    Linear(LinearRegression),
    /// Ridge
    Ridge(Ridge),
    /// Random forest
    RandomForest(RandomForestRegressor),
}

impl Estimator for FittedRegressor {
    fn fit_weighted(
        &mut self,
        x: &Matrix<f32>,
        y: &Vector<f32>,
        sample_weight: Option<&[f32]>,
    ) -> Result<()> {
        match self {
            Self::Linear(m) => m.fit_weighted(x, y, sample_weight),
            Self::Ridge(m) => m.fit_weighted(x, y, sample_weight),
            Self::RandomForest(m) => m.fit_weighted(x, y, sample_weight),
        }
    }

    fn predict(&self, x: &Matrix<f32>) -> Result<Vector<f32>> {
        match self {
            Self::Linear(m) => m.predict(x),
            Self::Ridge(m) => m.predict(x),
            Self::RandomForest(m) => m.predict(x),
        }
    }
}

/// Standardization followed by a regressor.
///
/// The scaler is fit on whatever rows the regressor is fit on, so each CV
/// fold scales with its own training statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaledRegressor {
    scaler: StandardScaler,
    regressor: FittedRegressor,
}

impl ScaledRegressor {
    /// Underlying regressor.
    #[must_use]
    pub fn regressor(&self) -> &FittedRegressor {
        &self.regressor
    }

    /// Forest feature importances, if the regressor is a fitted forest.
    #[must_use]
    pub fn feature_importances(&self) -> Option<Vec<f32>> {
        match &self.regressor {
            FittedRegressor::RandomForest(forest) => forest.feature_importances(),
            _ => None,
        }
    }

    /// Predicts one row.
    ///
    /// # Errors
    ///
    /// Fails if unfitted or the row has the wrong width.
    pub fn predict_row(&self, row: &[f32]) -> Result<f32> {
        let x = Matrix::from_vec(1, row.len(), row.to_vec())?;
        let prediction = self.predict(&x)?;
        Ok(prediction[0])
    }
}

impl Estimator for ScaledRegressor {
    fn fit_weighted(
        &mut self,
        x: &Matrix<f32>,
        y: &Vector<f32>,
        sample_weight: Option<&[f32]>,
    ) -> Result<()> {
        let scaled = self.scaler.fit_transform(x)?;
        self.regressor.fit_weighted(&scaled, y, sample_weight)
    }

    fn predict(&self, x: &Matrix<f32>) -> Result<Vector<f32>> {
        let scaled = self.scaler.transform(x)?;
        self.regressor.predict(&scaled)
    }
}
