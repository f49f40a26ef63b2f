//! Decision tree algorithms and ensemble methods.
//!
//! This module implements:
//! - CART regression trees (weighted SSE criterion)
//! - CART classification trees (weighted Gini criterion) with leaf class distributions
//! - Random forests of both, trained on seeded bootstrap samples
//!
//! # Example
//!
//! ```
//! use sizewise::prelude::*;
//! use sizewise::tree::RandomForestRegressor;
//!
//! let x = Matrix::from_vec(6, 1, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).expect("6x1");
//! let y = Vector::from_slice(&[2.0, 4.0, 6.0, 8.0, 10.0, 12.0]);
//!
//! let mut rf = RandomForestRegressor::new(10).with_max_depth(4).with_random_state(42);
//! rf.fit(&x, &y).expect("fit should succeed");
//! assert_eq!(rf.predict(&x).expect("fitted").len(), 6);
//! ```

mod helpers;

use crate::error::{Result, SizewiseError};
use crate::primitives::{Matrix, Vector};
use crate::traits::{resolve_weights, Classifier, Estimator};
use helpers::{bootstrap_sample, GrowthLimits};
use serde::{Deserialize, Serialize};

/// Leaf node in a regression tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionLeaf {
    /// Weighted mean of the targets that reached this leaf
    pub value: f32,
    /// Number of training samples in this leaf
    pub n_samples: usize,
}

/// Internal node in a regression tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionNode {
    /// Index of the feature to split on
    pub feature_idx: usize,
    /// Threshold value for the split
    pub threshold: f32,
    /// Weighted SSE reduction achieved by this split
    pub gain: f32,
    /// Left subtree (samples where feature <= threshold)
    pub left: Box<RegressionTreeNode>,
    /// Right subtree (samples where feature > threshold)
    pub right: Box<RegressionTreeNode>,
}

/// A node in a regression tree (either internal node or leaf).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegressionTreeNode {
    /// Internal decision node with split condition
    Node(RegressionNode),
    /// Leaf node with value prediction
    Leaf(RegressionLeaf),
}

impl RegressionTreeNode {
    /// Returns the depth of the tree rooted at this node.
    ///
    /// Leaf nodes have depth 0, internal nodes have depth 1 + max(left, right).
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            RegressionTreeNode::Leaf(_) => 0,
            RegressionTreeNode::Node(node) => 1 + node.left.depth().max(node.right.depth()),
        }
    }

    fn predict_one(&self, row: &[f32]) -> f32 {
        let mut node = self;
        loop {
            match node {
                RegressionTreeNode::Leaf(leaf) => return leaf.value,
                RegressionTreeNode::Node(n) => {
                    node = if row[n.feature_idx] <= n.threshold {
                        &n.left
                    } else {
                        &n.right
                    };
                }
            }
        }
    }
}

/// Leaf node in a classification tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationLeaf {
    /// Weighted class distribution of the samples in this leaf (sums to 1)
    pub distribution: Vec<f32>,
    /// Number of training samples in this leaf
    pub n_samples: usize,
}

/// Internal node in a classification tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationNode {
    /// Index of the feature to split on
    pub feature_idx: usize,
    /// Threshold value for the split
    pub threshold: f32,
    /// Weighted Gini decrease achieved by this split
    pub gain: f32,
    /// Left subtree (samples where feature <= threshold)
    pub left: Box<ClassificationTreeNode>,
    /// Right subtree (samples where feature > threshold)
    pub right: Box<ClassificationTreeNode>,
}

/// A node in a classification tree (either internal node or leaf).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClassificationTreeNode {
    /// Internal decision node with split condition
    Node(ClassificationNode),
    /// Leaf node with class distribution
    Leaf(ClassificationLeaf),
}

impl ClassificationTreeNode {
    /// Returns the depth of the tree rooted at this node.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            ClassificationTreeNode::Leaf(_) => 0,
            ClassificationTreeNode::Node(node) => 1 + node.left.depth().max(node.right.depth()),
        }
    }

    fn distribution_for(&self, row: &[f32]) -> &[f32] {
        let mut node = self;
        loop {
            match node {
                ClassificationTreeNode::Leaf(leaf) => return &leaf.distribution,
                ClassificationTreeNode::Node(n) => {
                    node = if row[n.feature_idx] <= n.threshold {
                        &n.left
                    } else {
                        &n.right
                    };
                }
            }
        }
    }
}

fn check_features(expected: usize, x: &Matrix<f32>) -> Result<()> {
    if x.n_cols() != expected {
        return Err(SizewiseError::estimator(format!(
            "model expects {expected} features, got {}",
            x.n_cols()
        )));
    }
    Ok(())
}

fn check_labels(y: &[usize], n_samples: usize, n_classes: usize) -> Result<()> {
    if y.len() != n_samples {
        return Err("Number of samples in X and y must match".into());
    }
    if n_classes == 0 || y.iter().any(|&label| label >= n_classes) {
        return Err("labels must lie in 0..n_classes".into());
    }
    Ok(())
}

/// Decision tree regressor using the CART algorithm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    tree: Option<RegressionTreeNode>,
    n_features: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
}

impl DecisionTreeRegressor {
    /// Creates a new decision tree regressor with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: None,
            n_features: 0,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }

    /// Sets the maximum depth of the tree.
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Sets the minimum number of samples in each leaf.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Root of the fitted tree.
    #[must_use]
    pub fn tree(&self) -> Option<&RegressionTreeNode> {
        self.tree.as_ref()
    }

    fn limits(&self) -> GrowthLimits {
        GrowthLimits {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Estimator for DecisionTreeRegressor {
    fn fit_weighted(
        &mut self,
        x: &Matrix<f32>,
        y: &Vector<f32>,
        sample_weight: Option<&[f32]>,
    ) -> Result<()> {
        let (n_samples, n_features) = x.shape();
        if n_samples != y.len() {
            return Err("Number of samples in X and y must match".into());
        }
        if n_samples == 0 {
            return Err("Cannot fit with zero samples".into());
        }
        let w = resolve_weights(sample_weight, n_samples)?;
        let indices: Vec<usize> = (0..n_samples).collect();
        self.tree = Some(helpers::build_regression_tree(
            x,
            y.as_slice(),
            &w,
            &indices,
            0,
            self.limits(),
        ));
        self.n_features = n_features;
        Ok(())
    }

    fn predict(&self, x: &Matrix<f32>) -> Result<Vector<f32>> {
        let tree = self
            .tree
            .as_ref()
            .ok_or_else(|| SizewiseError::from("Tree not fitted. Call fit() first."))?;
        check_features(self.n_features, x)?;
        Ok(Vector::from_vec(
            (0..x.n_rows())
                .map(|row| tree.predict_one(x.row_slice(row)))
                .collect(),
        ))
    }
}

/// Decision tree classifier using the CART algorithm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    tree: Option<ClassificationTreeNode>,
    n_features: usize,
    n_classes: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
}

impl DecisionTreeClassifier {
    /// Creates a new decision tree classifier with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: None,
            n_features: 0,
            n_classes: 0,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }

    /// Sets the maximum depth of the tree.
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Sets the minimum number of samples in each leaf.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Root of the fitted tree.
    #[must_use]
    pub fn tree(&self) -> Option<&ClassificationTreeNode> {
        self.tree.as_ref()
    }
}

impl Default for DecisionTreeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for DecisionTreeClassifier {
    fn fit_weighted(
        &mut self,
        x: &Matrix<f32>,
        y: &[usize],
        n_classes: usize,
        sample_weight: Option<&[f32]>,
    ) -> Result<()> {
        let (n_samples, n_features) = x.shape();
        if n_samples == 0 {
            return Err("Cannot fit with zero samples".into());
        }
        check_labels(y, n_samples, n_classes)?;
        let w = resolve_weights(sample_weight, n_samples)?;
        let indices: Vec<usize> = (0..n_samples).collect();
        let limits = GrowthLimits {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        };
        self.tree = Some(helpers::build_classification_tree(
            x, y, &w, n_classes, &indices, 0, limits,
        ));
        self.n_features = n_features;
        self.n_classes = n_classes;
        Ok(())
    }

    fn predict_proba(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        let tree = self
            .tree
            .as_ref()
            .ok_or_else(|| SizewiseError::from("Tree not fitted. Call fit() first."))?;
        check_features(self.n_features, x)?;
        let mut data = Vec::with_capacity(x.n_rows() * self.n_classes);
        for row in 0..x.n_rows() {
            data.extend_from_slice(tree.distribution_for(x.row_slice(row)));
        }
        Matrix::from_vec(x.n_rows(), self.n_classes, data).map_err(Into::into)
    }
}

/// Random Forest regressor - averages bootstrap-trained regression trees.
///
/// Tree `i` is trained on a bootstrap sample drawn with seed
/// `random_state + i`, so a fixed `random_state` gives identical forests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    trees: Vec<DecisionTreeRegressor>,
    n_estimators: usize,
    max_depth: Option<usize>,
    min_samples_leaf: usize,
    random_state: u64,
    n_features: usize,
}

impl RandomForestRegressor {
    /// Creates a new Random Forest regressor with `n_estimators` trees.
    #[must_use]
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators: n_estimators.max(1),
            max_depth: None,
            min_samples_leaf: 1,
            random_state: 0,
            n_features: 0,
        }
    }

    /// Sets the maximum depth for each tree.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Sets the minimum number of samples in each leaf.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Sets the random state for reproducibility.
    #[must_use]
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    /// Number of fitted trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Feature importances by mean decrease in weighted SSE, summing to 1.0.
    ///
    /// Returns `None` if the forest is unfitted.
    #[must_use]
    pub fn feature_importances(&self) -> Option<Vec<f32>> {
        if self.trees.is_empty() {
            return None;
        }
        let mut total = vec![0.0_f32; self.n_features];
        for tree in self.trees.iter().filter_map(DecisionTreeRegressor::tree) {
            let mut per_tree = vec![0.0_f32; self.n_features];
            helpers::accumulate_regression_importances(tree, &mut per_tree);
            helpers::normalize(&mut per_tree);
            for (t, p) in total.iter_mut().zip(&per_tree) {
                *t += p;
            }
        }
        helpers::normalize(&mut total);
        Some(total)
    }
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(10)
    }
}

impl Estimator for RandomForestRegressor {
    fn fit_weighted(
        &mut self,
        x: &Matrix<f32>,
        y: &Vector<f32>,
        sample_weight: Option<&[f32]>,
    ) -> Result<()> {
        let (n_samples, n_features) = x.shape();
        if n_samples != y.len() {
            return Err("Number of samples in X and y must match".into());
        }
        if n_samples == 0 {
            return Err("Cannot fit with zero samples".into());
        }
        let w = resolve_weights(sample_weight, n_samples)?;

        let mut trees = Vec::with_capacity(self.n_estimators);
        for i in 0..self.n_estimators {
            let bootstrap = bootstrap_sample(n_samples, self.random_state.wrapping_add(i as u64));
            let boot_w: Vec<f32> = bootstrap.iter().map(|&idx| w[idx]).collect();
            let boot_w = if boot_w.iter().sum::<f32>() > 0.0 {
                boot_w
            } else {
                vec![1.0; n_samples]
            };

            let mut tree = DecisionTreeRegressor::new().with_min_samples_leaf(self.min_samples_leaf);
            if let Some(depth) = self.max_depth {
                tree = tree.with_max_depth(depth);
            }
            tree.fit_weighted(&x.select_rows(&bootstrap), &y.select(&bootstrap), Some(&boot_w))?;
            trees.push(tree);
        }

        self.trees = trees;
        self.n_features = n_features;
        Ok(())
    }

    fn predict(&self, x: &Matrix<f32>) -> Result<Vector<f32>> {
        if self.trees.is_empty() {
            return Err("Cannot predict with an unfitted Random Forest. Call fit() first.".into());
        }
        let mut predictions = vec![0.0_f32; x.n_rows()];
        for tree in &self.trees {
            let tree_preds = tree.predict(x)?;
            for (pred, &tree_pred) in predictions.iter_mut().zip(tree_preds.as_slice()) {
                *pred += tree_pred;
            }
        }
        let n_trees = self.trees.len() as f32;
        for pred in &mut predictions {
            *pred /= n_trees;
        }
        Ok(Vector::from_vec(predictions))
    }
}

/// Random Forest classifier - averages the leaf class distributions of
/// bootstrap-trained classification trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    trees: Vec<DecisionTreeClassifier>,
    n_estimators: usize,
    max_depth: Option<usize>,
    min_samples_leaf: usize,
    random_state: u64,
    n_features: usize,
    n_classes: usize,
}

impl RandomForestClassifier {
    /// Creates a new Random Forest classifier with `n_estimators` trees.
    #[must_use]
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators: n_estimators.max(1),
            max_depth: None,
            min_samples_leaf: 1,
            random_state: 0,
            n_features: 0,
            n_classes: 0,
        }
    }

    /// Sets the maximum depth for each tree.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Sets the minimum number of samples in each leaf.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Sets the random state for reproducibility.
    #[must_use]
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    /// Feature importances by mean decrease in weighted Gini, summing to 1.0.
    #[must_use]
    pub fn feature_importances(&self) -> Option<Vec<f32>> {
        if self.trees.is_empty() {
            return None;
        }
        let mut total = vec![0.0_f32; self.n_features];
        for tree in self.trees.iter().filter_map(DecisionTreeClassifier::tree) {
            let mut per_tree = vec![0.0_f32; self.n_features];
            helpers::accumulate_classification_importances(tree, &mut per_tree);
            helpers::normalize(&mut per_tree);
            for (t, p) in total.iter_mut().zip(&per_tree) {
                *t += p;
            }
        }
        helpers::normalize(&mut total);
        Some(total)
    }
}

impl Default for RandomForestClassifier {
    fn default() -> Self {
        Self::new(10)
    }
}

impl Classifier for RandomForestClassifier {
    fn fit_weighted(
        &mut self,
        x: &Matrix<f32>,
        y: &[usize],
        n_classes: usize,
        sample_weight: Option<&[f32]>,
    ) -> Result<()> {
        let (n_samples, n_features) = x.shape();
        if n_samples == 0 {
            return Err("Cannot fit with zero samples".into());
        }
        check_labels(y, n_samples, n_classes)?;
        let w = resolve_weights(sample_weight, n_samples)?;

        let mut trees = Vec::with_capacity(self.n_estimators);
        for i in 0..self.n_estimators {
            let bootstrap = bootstrap_sample(n_samples, self.random_state.wrapping_add(i as u64));
            let boot_y: Vec<usize> = bootstrap.iter().map(|&idx| y[idx]).collect();
            let boot_w: Vec<f32> = bootstrap.iter().map(|&idx| w[idx]).collect();
            let boot_w = if boot_w.iter().sum::<f32>() > 0.0 {
                boot_w
            } else {
                vec![1.0; n_samples]
            };

            let mut tree =
                DecisionTreeClassifier::new().with_min_samples_leaf(self.min_samples_leaf);
            if let Some(depth) = self.max_depth {
                tree = tree.with_max_depth(depth);
            }
            tree.fit_weighted(&x.select_rows(&bootstrap), &boot_y, n_classes, Some(&boot_w))?;
            trees.push(tree);
        }

        self.trees = trees;
        self.n_features = n_features;
        self.n_classes = n_classes;
        Ok(())
    }

    fn predict_proba(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        if self.trees.is_empty() {
            return Err("Cannot predict with an unfitted Random Forest. Call fit() first.".into());
        }
        let mut sum = Matrix::zeros(x.n_rows(), self.n_classes);
        for tree in &self.trees {
            let proba = tree.predict_proba(x)?;
            for row in 0..x.n_rows() {
                for class in 0..self.n_classes {
                    sum.set(row, class, sum.get(row, class) + proba.get(row, class));
                }
            }
        }
        let n_trees = self.trees.len() as f32;
        let data: Vec<f32> = sum.as_slice().iter().map(|v| v / n_trees).collect();
        Matrix::from_vec(x.n_rows(), self.n_classes, data).map_err(Into::into)
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
