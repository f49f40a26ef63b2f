//! Dense vector type.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// A contiguous 1D vector of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector<T> {
    data: Vec<T>,
}

impl<T: Copy> Vector<T> {
    /// Wraps an owned buffer.
    #[must_use]
    pub fn from_vec(data: Vec<T>) -> Self {
        Self { data }
    }

    /// Copies a slice.
    #[must_use]
    pub fn from_slice(data: &[T]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the vector has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrows the elements.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Gathers the given indices.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        Self::from_vec(indices.iter().map(|&i| self.data[i]).collect())
    }
}

impl Vector<f32> {
    /// Sum of elements.
    #[must_use]
    pub fn sum(&self) -> f32 {
        self.data.iter().sum()
    }

    /// Arithmetic mean, 0.0 for an empty vector.
    #[must_use]
    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            0.0
        } else {
            self.sum() / self.data.len() as f32
        }
    }
}

impl<T> Index<usize> for Vector<T> {
    type Output = T;

    fn index(&self, idx: usize) -> &T {
        &self.data[idx]
    }
}

impl<T> IndexMut<usize> for Vector<T> {
    fn index_mut(&mut self, idx: usize) -> &mut T {
        &mut self.data[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_and_mean() {
        let a = Vector::from_slice(&[1.0, 2.0, 3.0]);
        assert!((a.sum() - 6.0).abs() < 1e-6);
        assert!((a.mean() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_select_allows_repeats() {
        let v = Vector::from_slice(&[10.0_f32, 20.0, 30.0, 40.0]);
        assert_eq!(v.select(&[3, 0, 0]).as_slice(), &[40.0, 10.0, 10.0]);
    }

    #[test]
    fn test_empty_mean_is_zero() {
        let v: Vector<f32> = Vector::from_vec(vec![]);
        assert!(v.is_empty());
        assert_eq!(v.mean(), 0.0);
    }
}
