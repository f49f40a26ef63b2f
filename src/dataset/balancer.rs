//! Staged corpus balancing across gender, age band and target class.
//!
//! Stages run in a fixed order and each sees only the previous stage's
//! output:
//!
//! 1. gender: downsample the majority gender to the minority's count
//! 2. age band: within each gender, downsample bands to the smallest
//!    non-empty band, never below `age_band_floor`
//! 3. class: within each gender, downsample classes to the rarest class,
//!    never below `class_floor`
//! 4. synthetic: interpolate new rows for classes still below their
//!    gender's largest class
//! 5. parity: trim the larger gender so `|F − M| <= gender_tolerance`

use super::oversample::SyntheticOversampler;
use super::{AgeBand, SizeExample};
use crate::config::BalancerConfig;
use crate::features::FeatureRecord;
use crate::profile::Gender;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A row the balancer can group and oversample.
pub trait Balanceable: Clone {
    /// Gender of the row.
    fn gender(&self) -> Gender;

    /// Age in whole years.
    fn age(&self) -> u8;

    /// Target class used for class-frequency balancing.
    fn class_key(&self) -> String;

    /// Numeric features interpolated by oversampling.
    fn numeric_features(&self) -> &[f32];

    /// Whether the row is synthetic.
    fn is_synthetic(&self) -> bool;

    /// Builds a synthetic row from interpolated features, keeping the
    /// reference row's label and scaling its weight by `weight_factor`.
    /// Returns `None` if the features cannot form a valid row.
    fn synthesize(reference: &Self, features: Vec<f32>, weight_factor: f32) -> Option<Self>;
}

impl Balanceable for SizeExample {
    fn gender(&self) -> Gender {
        self.features.gender()
    }

    fn age(&self) -> u8 {
        self.features.age()
    }

    fn class_key(&self) -> String {
        self.target.clone()
    }

    fn numeric_features(&self) -> &[f32] {
        self.features.values()
    }

    fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    fn synthesize(reference: &Self, features: Vec<f32>, weight_factor: f32) -> Option<Self> {
        let features = FeatureRecord::from_values(reference.features.schema(), features).ok()?;
        Some(Self {
            features,
            target: reference.target.clone(),
            sample_weight: reference.sample_weight * weight_factor,
            temporal_weight: reference.temporal_weight,
            synthetic: true,
        })
    }
}

/// Balancing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStage {
    /// Gender downsampling
    Gender,
    /// Age-band downsampling
    AgeBand,
    /// Class downsampling
    Class,
    /// Synthetic oversampling
    Synthetic,
    /// Final gender parity trim
    Parity,
}

/// Row counts after one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage
    pub stage: BalanceStage,
    /// Female rows after the stage
    pub female: usize,
    /// Male rows after the stage
    pub male: usize,
    /// Stage did not run, with the reason
    pub skipped: Option<String>,
}

/// Balanced rows plus per-stage counts.
#[derive(Debug, Clone)]
pub struct BalanceOutcome<E> {
    /// Balanced rows
    pub examples: Vec<E>,
    /// One report per stage, in order
    pub stages: Vec<StageReport>,
    /// Synthetic rows in the balanced output
    pub synthetic_rows: usize,
}

impl<E: Balanceable> BalanceOutcome<E> {
    /// Rows of one gender.
    #[must_use]
    pub fn count(&self, gender: Gender) -> usize {
        self.examples.iter().filter(|e| e.gender() == gender).count()
    }
}

/// Staged dataset balancer.
///
/// # Examples
///
/// ```
/// use sizewise::config::BalancerConfig;
/// use sizewise::dataset::DatasetBalancer;
///
/// let balancer = DatasetBalancer::new(BalancerConfig::default());
/// assert_eq!(balancer.config().gender_tolerance, 5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DatasetBalancer {
    config: BalancerConfig,
}

impl DatasetBalancer {
    /// Creates a balancer.
    #[must_use]
    pub fn new(config: BalancerConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    /// Runs every stage in order.
    pub fn balance<E: Balanceable>(&self, rows: Vec<E>) -> BalanceOutcome<E> {
        let mut rng = StdRng::seed_from_u64(self.config.random_state);
        let mut stages = Vec::with_capacity(5);

        let rows = self.balance_gender(rows, &mut rng, &mut stages);
        let rows = self.balance_age_bands(rows, &mut rng, &mut stages);
        let rows = self.balance_classes(rows, &mut rng, &mut stages);
        let rows = self.oversample(rows, &mut rng, &mut stages);
        let rows = self.enforce_parity(rows, &mut rng, &mut stages);

        let outcome = BalanceOutcome {
            synthetic_rows: rows.iter().filter(|r| r.is_synthetic()).count(),
            examples: rows,
            stages,
        };
        tracing::info!(
            female = outcome.count(Gender::Female),
            male = outcome.count(Gender::Male),
            synthetic = outcome.synthetic_rows,
            "dataset balanced"
        );
        outcome
    }

    fn balance_gender<E: Balanceable>(
        &self,
        rows: Vec<E>,
        rng: &mut StdRng,
        stages: &mut Vec<StageReport>,
    ) -> Vec<E> {
        let (female, male): (Vec<E>, Vec<E>) =
            rows.into_iter().partition(|r| r.gender() == Gender::Female);
        if female.is_empty() || male.is_empty() {
            let rows: Vec<E> = female.into_iter().chain(male).collect();
            stages.push(report(BalanceStage::Gender, &rows, Some("only one gender present")));
            return rows;
        }
        let target = female.len().min(male.len());
        let mut rows = downsample(female, target, rng);
        rows.extend(downsample(male, target, rng));
        stages.push(report(BalanceStage::Gender, &rows, None));
        rows
    }

    fn balance_age_bands<E: Balanceable>(
        &self,
        rows: Vec<E>,
        rng: &mut StdRng,
        stages: &mut Vec<StageReport>,
    ) -> Vec<E> {
        let mut out = Vec::with_capacity(rows.len());
        for (_, gender_rows) in group_by(rows, |r| r.gender()) {
            let bands = group_by(gender_rows, |r| AgeBand::from_age(r.age()));
            let smallest = bands.values().map(Vec::len).min().unwrap_or(0);
            let target = smallest.max(self.config.age_band_floor);
            for (_, band_rows) in bands {
                out.extend(downsample(band_rows, target, rng));
            }
        }
        stages.push(report(BalanceStage::AgeBand, &out, None));
        out
    }

    fn balance_classes<E: Balanceable>(
        &self,
        rows: Vec<E>,
        rng: &mut StdRng,
        stages: &mut Vec<StageReport>,
    ) -> Vec<E> {
        let mut out = Vec::with_capacity(rows.len());
        for (_, gender_rows) in group_by(rows, |r| r.gender()) {
            let classes = group_by(gender_rows, Balanceable::class_key);
            let rarest = classes.values().map(Vec::len).min().unwrap_or(0);
            let target = rarest.max(self.config.class_floor);
            for (_, class_rows) in classes {
                out.extend(downsample(class_rows, target, rng));
            }
        }
        stages.push(report(BalanceStage::Class, &out, None));
        out
    }

    fn oversample<E: Balanceable>(
        &self,
        rows: Vec<E>,
        rng: &mut StdRng,
        stages: &mut Vec<StageReport>,
    ) -> Vec<E> {
        let n_features = rows.first().map_or(0, |r| r.numeric_features().len());
        if n_features < self.config.min_numeric_features {
            tracing::warn!(
                n_features,
                required = self.config.min_numeric_features,
                "too few numeric features, synthetic oversampling skipped"
            );
            stages.push(report(
                BalanceStage::Synthetic,
                &rows,
                Some("insufficient numeric features"),
            ));
            return rows;
        }

        let oversampler = SyntheticOversampler::new(self.config.smote_neighbors)
            .with_weight_factor(self.config.synthetic_weight);
        let mut out = Vec::with_capacity(rows.len());
        for (_, gender_rows) in group_by(rows, |r| r.gender()) {
            let classes = group_by(gender_rows, Balanceable::class_key);
            let majority = classes.values().map(Vec::len).max().unwrap_or(0);
            for (class, class_rows) in classes {
                let missing = majority - class_rows.len();
                if missing > 0 {
                    let synthetic = oversampler.generate(&class_rows, missing, rng);
                    if synthetic.len() < missing {
                        tracing::debug!(class, missing, generated = synthetic.len(), "class only partly oversampled");
                    }
                    out.extend(class_rows);
                    out.extend(synthetic);
                } else {
                    out.extend(class_rows);
                }
            }
        }
        stages.push(report(BalanceStage::Synthetic, &out, None));
        out
    }

    fn enforce_parity<E: Balanceable>(
        &self,
        rows: Vec<E>,
        rng: &mut StdRng,
        stages: &mut Vec<StageReport>,
    ) -> Vec<E> {
        let (female, male): (Vec<E>, Vec<E>) =
            rows.into_iter().partition(|r| r.gender() == Gender::Female);
        if female.is_empty() || male.is_empty() {
            let rows: Vec<E> = female.into_iter().chain(male).collect();
            stages.push(report(BalanceStage::Parity, &rows, Some("only one gender present")));
            return rows;
        }
        let cap = female.len().min(male.len()) + self.config.gender_tolerance;
        let mut rows = downsample(female, cap, rng);
        rows.extend(downsample(male, cap, rng));
        stages.push(report(BalanceStage::Parity, &rows, None));
        rows
    }
}

/// Keeps a random `target` rows, preserving input order.
fn downsample<E>(rows: Vec<E>, target: usize, rng: &mut StdRng) -> Vec<E> {
    if rows.len() <= target {
        return rows;
    }
    let mut indices: Vec<usize> = (0..rows.len()).collect();
    indices.shuffle(rng);
    let mut keep = vec![false; rows.len()];
    for &i in &indices[..target] {
        keep[i] = true;
    }
    rows.into_iter()
        .zip(keep)
        .filter_map(|(row, kept)| kept.then_some(row))
        .collect()
}

fn group_by<E, K: Ord>(rows: Vec<E>, key: impl Fn(&E) -> K) -> BTreeMap<K, Vec<E>> {
    let mut groups: BTreeMap<K, Vec<E>> = BTreeMap::new();
    for row in rows {
        groups.entry(key(&row)).or_default().push(row);
    }
    groups
}

fn report<E: Balanceable>(stage: BalanceStage, rows: &[E], skipped: Option<&str>) -> StageReport {
    StageReport {
        stage,
        female: rows.iter().filter(|r| r.gender() == Gender::Female).count(),
        male: rows.iter().filter(|r| r.gender() == Gender::Male).count(),
        skipped: skipped.map(str::to_string),
    }
}

#[cfg(test)]
#[path = "balancer_tests.rs"]
mod tests;
