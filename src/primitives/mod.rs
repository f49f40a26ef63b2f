//! Core compute primitives (Vector, Matrix).
//!
//! Every estimator in the crate consumes these types.

mod matrix;
mod vector;

pub use matrix::Matrix;
pub use vector::Vector;
