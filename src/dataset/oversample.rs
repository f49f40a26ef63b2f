//! SMOTE-style synthetic minority oversampling.
//!
//! A synthetic row is `x + λ·(n − x)` where `x` is a random member of the
//! class, `n` one of its `k` nearest neighbours in the same class and
//! `λ ~ U[0, 1)`.
//!
//! # References
//!
//! Chawla, N. V., Bowyer, K. W., Hall, L. O., & Kegelmeyer, W. P. (2002).
//! SMOTE: Synthetic Minority Over-sampling Technique. JAIR 16.

use super::Balanceable;
use rand::rngs::StdRng;
use rand::Rng;

/// Interpolating oversampler.
#[derive(Debug, Clone)]
pub struct SyntheticOversampler {
    k_neighbors: usize,
    weight_factor: f32,
}

impl Default for SyntheticOversampler {
    fn default() -> Self {
        Self::new(5)
    }
}

impl SyntheticOversampler {
    /// Creates an oversampler using `k_neighbors` nearest neighbours.
    #[must_use]
    pub fn new(k_neighbors: usize) -> Self {
        Self {
            k_neighbors: k_neighbors.max(1),
            weight_factor: 1.0,
        }
    }

    /// Scales the sample weight of synthetic rows.
    #[must_use]
    pub fn with_weight_factor(mut self, factor: f32) -> Self {
        self.weight_factor = factor;
        self
    }

    /// Generates up to `n_new` rows from one class.
    ///
    /// Classes with fewer than two rows cannot be interpolated and yield
    /// nothing.
    pub fn generate<E: Balanceable>(&self, class_rows: &[E], n_new: usize, rng: &mut StdRng) -> Vec<E> {
        if class_rows.len() < 2 || n_new == 0 {
            return Vec::new();
        }
        let neighbors = self.neighbor_lists(class_rows);
        let mut out = Vec::with_capacity(n_new);
        for _ in 0..n_new {
            let base_idx = rng.gen_range(0..class_rows.len());
            let candidates = &neighbors[base_idx];
            let neighbor_idx = candidates[rng.gen_range(0..candidates.len())];
            let lambda: f32 = rng.gen();

            let base = class_rows[base_idx].numeric_features();
            let neighbor = class_rows[neighbor_idx].numeric_features();
            let features = base
                .iter()
                .zip(neighbor)
                .map(|(&b, &n)| b + lambda * (n - b))
                .collect();
            if let Some(row) = E::synthesize(&class_rows[base_idx], features, self.weight_factor) {
                out.push(row);
            }
        }
        out
    }

    fn neighbor_lists<E: Balanceable>(&self, rows: &[E]) -> Vec<Vec<usize>> {
        let k = self.k_neighbors.min(rows.len() - 1);
        (0..rows.len())
            .map(|i| {
                let mut by_distance: Vec<(f32, usize)> = (0..rows.len())
                    .filter(|&j| j != i)
                    .map(|j| (squared_distance(rows[i].numeric_features(), rows[j].numeric_features()), j))
                    .collect();
                by_distance.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                by_distance.into_iter().take(k).map(|(_, j)| j).collect()
            })
            .collect()
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
