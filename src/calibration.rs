//! Probability calibration for the size ensemble.
//!
//! Ensemble outputs are averaged vote/softmax probabilities, which tend to be
//! over- or under-confident. Temperature scaling is fit on a held-out split
//! and applied to log-probabilities before the final softmax.

use crate::classification::softmax_in_place;
use serde::{Deserialize, Serialize};

/// Temperature scaling: a single scalar `T` that sharpens (`T < 1`) or
/// softens (`T > 1`) a probability vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureScaling {
    temperature: f32,
}

impl Default for TemperatureScaling {
    fn default() -> Self {
        Self::new()
    }
}

impl TemperatureScaling {
    /// Identity calibration (`T = 1`).
    #[must_use]
    pub fn new() -> Self {
        Self { temperature: 1.0 }
    }

    /// Fits `T` on a held-out set by weighted NLL grid search over `[0.25, 4.0]`.
    ///
    /// Leaves `T = 1` if the held-out set is empty.
    pub fn fit(&mut self, probabilities: &[Vec<f32>], labels: &[usize], weights: &[f32]) {
        if probabilities.is_empty() {
            self.temperature = 1.0;
            return;
        }
        let mut best_temp = 1.0;
        let mut best_nll = Self::weighted_nll(probabilities, labels, weights, 1.0);

        for step in 0..=75 {
            let t = 0.25 + step as f32 * 0.05;
            let nll = Self::weighted_nll(probabilities, labels, weights, t);
            if nll < best_nll - 1e-7 {
                best_nll = nll;
                best_temp = t;
            }
        }
        self.temperature = best_temp;
    }

    fn weighted_nll(probabilities: &[Vec<f32>], labels: &[usize], weights: &[f32], temp: f32) -> f32 {
        let mut total = 0.0;
        let mut w_total = 0.0;
        for ((proba, &label), &w) in probabilities.iter().zip(labels).zip(weights) {
            let calibrated = scale(proba, temp);
            total -= w * calibrated[label].max(1e-10).ln();
            w_total += w;
        }
        if w_total > 0.0 {
            total / w_total
        } else {
            f32::INFINITY
        }
    }

    /// Applies the fitted temperature to one probability vector.
    #[must_use]
    pub fn calibrate(&self, probabilities: &[f32]) -> Vec<f32> {
        scale(probabilities, self.temperature)
    }

    /// Fitted temperature.
    #[must_use]
    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

fn scale(probabilities: &[f32], temp: f32) -> Vec<f32> {
    let mut logits: Vec<f32> = probabilities
        .iter()
        .map(|&p| p.max(1e-6).ln() / temp)
        .collect();
    softmax_in_place(&mut logits);
    logits
}

/// Expected calibration error of top-1 confidence (equal-width bins).
///
/// # Panics
///
/// Panics if `probabilities` and `labels` differ in length.
#[must_use]
pub fn expected_calibration_error(probabilities: &[Vec<f32>], labels: &[usize], n_bins: usize) -> f32 {
    assert_eq!(probabilities.len(), labels.len(), "Lengths must match");
    if probabilities.is_empty() || n_bins == 0 {
        return 0.0;
    }
    let mut bin_conf = vec![0.0_f32; n_bins];
    let mut bin_correct = vec![0.0_f32; n_bins];
    let mut bin_count = vec![0usize; n_bins];

    for (proba, &label) in probabilities.iter().zip(labels) {
        let top = crate::traits::argmax(proba);
        let conf = proba.get(top).copied().unwrap_or(0.0);
        let bin = ((conf * n_bins as f32) as usize).min(n_bins - 1);
        bin_conf[bin] += conf;
        bin_correct[bin] += if top == label { 1.0 } else { 0.0 };
        bin_count[bin] += 1;
    }

    let n = probabilities.len() as f32;
    (0..n_bins)
        .filter(|&b| bin_count[b] > 0)
        .map(|b| {
            let count = bin_count[b] as f32;
            (count / n) * (bin_conf[b] / count - bin_correct[b] / count).abs()
        })
        .sum()
}

#[cfg(test)]
#[path = "calibration_tests.rs"]
mod tests;
