//! Split search and tree construction helpers.
//!
//! Both criteria work on a row-index slice into the caller's matrix and
//! sweep each feature once after sorting, so a node costs
//! `O(n_features · n log n)`. Accumulators are `f64` because squared
//! heights in centimetres overflow `f32` precision quickly.

use super::{
    ClassificationLeaf, ClassificationNode, ClassificationTreeNode, RegressionLeaf,
    RegressionNode, RegressionTreeNode,
};
use crate::primitives::Matrix;
use std::cmp::Ordering;

/// Stopping parameters shared by both tree kinds.
#[derive(Debug, Clone, Copy)]
pub(super) struct GrowthLimits {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl GrowthLimits {
    fn stop(&self, depth: usize, n_samples: usize) -> bool {
        n_samples < self.min_samples_split || self.max_depth.is_some_and(|d| depth >= d)
    }
}

/// Best split found for a node.
#[derive(Debug, Clone, Copy)]
pub(super) struct Split {
    pub feature_idx: usize,
    pub threshold: f32,
    pub gain: f64,
}

fn sorted_by_feature(x: &Matrix<f32>, indices: &[usize], feature_idx: usize) -> Vec<usize> {
    let mut sorted = indices.to_vec();
    sorted.sort_by(|&a, &b| {
        x.get(a, feature_idx)
            .partial_cmp(&x.get(b, feature_idx))
            .unwrap_or(Ordering::Equal)
    });
    sorted
}

fn weighted_sse(sw: f64, swy: f64, swy2: f64) -> f64 {
    if sw <= 0.0 {
        0.0
    } else {
        (swy2 - swy * swy / sw).max(0.0)
    }
}

/// Finds the split with the largest weighted SSE reduction.
pub(super) fn best_regression_split(
    x: &Matrix<f32>,
    y: &[f32],
    w: &[f32],
    indices: &[usize],
    min_samples_leaf: usize,
) -> Option<Split> {
    let n = indices.len();
    if n < 2 {
        return None;
    }
    let (mut sw, mut swy, mut swy2) = (0.0_f64, 0.0_f64, 0.0_f64);
    for &i in indices {
        let (wi, yi) = (f64::from(w[i]), f64::from(y[i]));
        sw += wi;
        swy += wi * yi;
        swy2 += wi * yi * yi;
    }
    let parent = weighted_sse(sw, swy, swy2);

    let mut best: Option<Split> = None;
    for feature_idx in 0..x.n_cols() {
        let sorted = sorted_by_feature(x, indices, feature_idx);
        let (mut lw, mut lwy, mut lwy2) = (0.0_f64, 0.0_f64, 0.0_f64);

        for pos in 0..n - 1 {
            let i = sorted[pos];
            let (wi, yi) = (f64::from(w[i]), f64::from(y[i]));
            lw += wi;
            lwy += wi * yi;
            lwy2 += wi * yi * yi;

            let left_count = pos + 1;
            if left_count < min_samples_leaf || n - left_count < min_samples_leaf {
                continue;
            }
            let (here, next) = (x.get(i, feature_idx), x.get(sorted[pos + 1], feature_idx));
            if next - here <= 1e-10 {
                continue;
            }

            let children = weighted_sse(lw, lwy, lwy2)
                + weighted_sse(sw - lw, swy - lwy, swy2 - lwy2);
            let gain = parent - children;
            if gain > 1e-9 && best.map_or(true, |b| gain > b.gain) {
                best = Some(Split {
                    feature_idx,
                    threshold: (here + next) / 2.0,
                    gain,
                });
            }
        }
    }
    best
}

fn weighted_gini(class_weights: &[f64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - class_weights
        .iter()
        .map(|c| (c / total).powi(2))
        .sum::<f64>()
}

/// Finds the split with the largest weighted Gini decrease.
pub(super) fn best_classification_split(
    x: &Matrix<f32>,
    y: &[usize],
    w: &[f32],
    n_classes: usize,
    indices: &[usize],
    min_samples_leaf: usize,
) -> Option<Split> {
    let n = indices.len();
    if n < 2 {
        return None;
    }
    let mut totals = vec![0.0_f64; n_classes];
    for &i in indices {
        totals[y[i]] += f64::from(w[i]);
    }
    let sw: f64 = totals.iter().sum();
    let parent = sw * weighted_gini(&totals, sw);

    let mut best: Option<Split> = None;
    for feature_idx in 0..x.n_cols() {
        let sorted = sorted_by_feature(x, indices, feature_idx);
        let mut left = vec![0.0_f64; n_classes];
        let mut lw = 0.0_f64;

        for pos in 0..n - 1 {
            let i = sorted[pos];
            left[y[i]] += f64::from(w[i]);
            lw += f64::from(w[i]);

            let left_count = pos + 1;
            if left_count < min_samples_leaf || n - left_count < min_samples_leaf {
                continue;
            }
            let (here, next) = (x.get(i, feature_idx), x.get(sorted[pos + 1], feature_idx));
            if next - here <= 1e-10 {
                continue;
            }

            let right: Vec<f64> = totals.iter().zip(&left).map(|(t, l)| t - l).collect();
            let rw = sw - lw;
            let children = lw * weighted_gini(&left, lw) + rw * weighted_gini(&right, rw);
            let gain = parent - children;
            if gain > 1e-9 && best.map_or(true, |b| gain > b.gain) {
                best = Some(Split {
                    feature_idx,
                    threshold: (here + next) / 2.0,
                    gain,
                });
            }
        }
    }
    best
}

fn partition(x: &Matrix<f32>, indices: &[usize], split: &Split) -> (Vec<usize>, Vec<usize>) {
    indices
        .iter()
        .copied()
        .partition(|&i| x.get(i, split.feature_idx) <= split.threshold)
}

fn regression_leaf(y: &[f32], w: &[f32], indices: &[usize]) -> RegressionTreeNode {
    let sw: f64 = indices.iter().map(|&i| f64::from(w[i])).sum();
    let value = if sw > 0.0 {
        indices
            .iter()
            .map(|&i| f64::from(w[i]) * f64::from(y[i]))
            .sum::<f64>()
            / sw
    } else {
        indices.iter().map(|&i| f64::from(y[i])).sum::<f64>() / indices.len().max(1) as f64
    };
    RegressionTreeNode::Leaf(RegressionLeaf {
        value: value as f32,
        n_samples: indices.len(),
    })
}

/// Grows a regression tree over `indices`.
pub(super) fn build_regression_tree(
    x: &Matrix<f32>,
    y: &[f32],
    w: &[f32],
    indices: &[usize],
    depth: usize,
    limits: GrowthLimits,
) -> RegressionTreeNode {
    if limits.stop(depth, indices.len()) {
        return regression_leaf(y, w, indices);
    }
    let Some(split) = best_regression_split(x, y, w, indices, limits.min_samples_leaf) else {
        return regression_leaf(y, w, indices);
    };
    let (left, right) = partition(x, indices, &split);
    if left.is_empty() || right.is_empty() {
        return regression_leaf(y, w, indices);
    }

    RegressionTreeNode::Node(RegressionNode {
        feature_idx: split.feature_idx,
        threshold: split.threshold,
        gain: split.gain as f32,
        left: Box::new(build_regression_tree(x, y, w, &left, depth + 1, limits)),
        right: Box::new(build_regression_tree(x, y, w, &right, depth + 1, limits)),
    })
}

fn classification_leaf(
    y: &[usize],
    w: &[f32],
    n_classes: usize,
    indices: &[usize],
) -> ClassificationTreeNode {
    let mut distribution = vec![0.0_f32; n_classes];
    for &i in indices {
        distribution[y[i]] += w[i];
    }
    let total: f32 = distribution.iter().sum();
    if total > 0.0 {
        for p in &mut distribution {
            *p /= total;
        }
    } else {
        for &i in indices {
            distribution[y[i]] += 1.0 / indices.len() as f32;
        }
    }
    ClassificationTreeNode::Leaf(ClassificationLeaf {
        distribution,
        n_samples: indices.len(),
    })
}

/// Grows a classification tree over `indices`.
pub(super) fn build_classification_tree(
    x: &Matrix<f32>,
    y: &[usize],
    w: &[f32],
    n_classes: usize,
    indices: &[usize],
    depth: usize,
    limits: GrowthLimits,
) -> ClassificationTreeNode {
    let pure = indices.windows(2).all(|pair| y[pair[0]] == y[pair[1]]);
    if pure || limits.stop(depth, indices.len()) {
        return classification_leaf(y, w, n_classes, indices);
    }
    let Some(split) =
        best_classification_split(x, y, w, n_classes, indices, limits.min_samples_leaf)
    else {
        return classification_leaf(y, w, n_classes, indices);
    };
    let (left, right) = partition(x, indices, &split);
    if left.is_empty() || right.is_empty() {
        return classification_leaf(y, w, n_classes, indices);
    }

    ClassificationTreeNode::Node(ClassificationNode {
        feature_idx: split.feature_idx,
        threshold: split.threshold,
        gain: split.gain as f32,
        left: Box::new(build_classification_tree(
            x,
            y,
            w,
            n_classes,
            &left,
            depth + 1,
            limits,
        )),
        right: Box::new(build_classification_tree(
            x,
            y,
            w,
            n_classes,
            &right,
            depth + 1,
            limits,
        )),
    })
}

/// Adds each split's gain to its feature's slot.
pub(super) fn accumulate_regression_importances(node: &RegressionTreeNode, out: &mut [f32]) {
    if let RegressionTreeNode::Node(n) = node {
        out[n.feature_idx] += n.gain;
        accumulate_regression_importances(&n.left, out);
        accumulate_regression_importances(&n.right, out);
    }
}

/// Adds each split's gain to its feature's slot.
pub(super) fn accumulate_classification_importances(
    node: &ClassificationTreeNode,
    out: &mut [f32],
) {
    if let ClassificationTreeNode::Node(n) = node {
        out[n.feature_idx] += n.gain;
        accumulate_classification_importances(&n.left, out);
        accumulate_classification_importances(&n.right, out);
    }
}

/// Divides by the total so importances sum to 1 (no-op when all zero).
pub(super) fn normalize(values: &mut [f32]) {
    let total: f32 = values.iter().sum();
    if total > 0.0 {
        for v in values {
            *v /= total;
        }
    }
}

/// Draws `n_samples` indices uniformly with replacement.
pub(super) fn bootstrap_sample(n_samples: usize, seed: u64) -> Vec<usize> {
    use rand::distributions::{Distribution, Uniform};
    use rand::SeedableRng;

    let dist = Uniform::from(0..n_samples);
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..n_samples).map(|_| dist.sample(&mut rng)).collect()
}

#[cfg(test)]
#[path = "helpers_tests.rs"]
mod tests;
