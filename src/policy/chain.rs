use crate::config::PolicyConfig;
use crate::error::{Result, SizewiseError};
use crate::explain::{ConfidenceImpact, ExplanationStep, ExplanationTrace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A decision strategy in a fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Calibrated size ensemble
    Ensemble,
    /// Per-pair measurement regressor
    TrainedModel,
    /// Deterministic garment rule or girth chart
    GarmentRule,
    /// Generic anthropometric ratios or height chart
    GenericRule,
    /// External rule-function collaborator
    ExternalRule,
    /// Age-only tables
    AgeOnly,
}

impl Tier {
    /// Method tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ensemble => "ensemble",
            Self::TrainedModel => "trained_model",
            Self::GarmentRule => "garment_rule",
            Self::GenericRule => "generic_rule",
            Self::ExternalRule => "external_rule",
            Self::AgeOnly => "age_only",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened at one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierAttempt {
    /// Tier
    pub tier: Tier,
    /// Whether it produced the decision
    pub succeeded: bool,
    /// Confidence the tier reported before capping and penalties
    pub raw_confidence: Option<f32>,
    /// Failure reason
    pub reason: Option<String>,
    /// Penalty charged for the failure
    pub penalty: f32,
}

pub(super) struct TierResult<T> {
    pub(super) value: T,
    pub(super) raw_confidence: f32,
    pub(super) method: String,
    pub(super) steps: Vec<ExplanationStep>,
}

pub(super) struct ChainOutcome<T> {
    pub(super) value: T,
    pub(super) tier: Tier,
    pub(super) method: String,
    pub(super) raw_confidence: f32,
    pub(super) confidence: f32,
    pub(super) attempts: Vec<TierAttempt>,
}

pub(super) struct ChainRunner<'a> {
    pub(super) ceilings: &'a [f32],
    pub(super) config: &'a PolicyConfig,
    pub(super) disabled: &'a BTreeSet<Tier>,
}

impl ChainRunner<'_> {
    fn penalty_for(&self, err: &SizewiseError) -> f32 {
        if err.is_expected_miss() {
            self.config.expected_miss_penalty
        } else {
            self.config.failure_penalty
        }
    }

    /// Tries `chain` in order; the first success ends it.
    pub(super) fn run<T>(
        &self,
        decision: &str,
        chain: &[Tier],
        trace: &mut ExplanationTrace,
        mut attempt: impl FnMut(Tier) -> Result<TierResult<T>>,
    ) -> Result<ChainOutcome<T>> {
        let mut attempts = Vec::with_capacity(chain.len());
        let mut accumulated = 0.0_f32;

        for (position, &tier) in chain.iter().enumerate() {
            let result = if self.disabled.contains(&tier) {
                Err(SizewiseError::unavailable(tier.as_str(), "tier disabled"))
            } else {
                attempt(tier)
            };

            match result {
                Ok(result) => {
                    let ceiling = self.ceilings.get(position).copied().unwrap_or(1.0);
                    let capped = result.raw_confidence.clamp(0.0, 1.0).min(ceiling);
                    let confidence = (capped - accumulated).max(self.config.confidence_floor).clamp(0.0, 1.0);

                    trace.extend_steps(result.steps);
                    trace.push_step(
                        ExplanationStep::new("tier_selected")
                            .input("tier", tier.as_str())
                            .input("raw_confidence", result.raw_confidence)
                            .input("ceiling", ceiling)
                            .input("accumulated_penalty", accumulated)
                            .output(confidence)
                            .reasoning(format!("{decision} served by {tier}"))
                            .impact(ConfidenceImpact::Absolute(confidence)),
                    );
                    attempts.push(TierAttempt {
                        tier,
                        succeeded: true,
                        raw_confidence: Some(result.raw_confidence),
                        reason: None,
                        penalty: 0.0,
                    });
                    tracing::debug!(decision, tier = tier.as_str(), confidence, "tier succeeded");
                    return Ok(ChainOutcome {
                        value: result.value,
                        tier,
                        method: result.method,
                        raw_confidence: result.raw_confidence,
                        confidence,
                        attempts,
                    });
                }
                Err(err) => {
                    let penalty = self.penalty_for(&err);
                    accumulated += penalty;
                    if matches!(err, SizewiseError::IntegrityError { .. }) {
                        tracing::error!(decision, tier = tier.as_str(), error = %err, "tier demoted");
                    } else {
                        tracing::debug!(decision, tier = tier.as_str(), error = %err, "tier demoted");
                    }
                    trace.push_step(
                        ExplanationStep::new("tier_demotion")
                            .input("tier", tier.as_str())
                            .output(false)
                            .reasoning(err.to_string())
                            .impact(ConfidenceImpact::Delta(-penalty)),
                    );
                    attempts.push(TierAttempt {
                        tier,
                        succeeded: false,
                        raw_confidence: None,
                        reason: Some(err.to_string()),
                        penalty,
                    });
                }
            }
        }

        tracing::warn!(decision, "all tiers exhausted");
        Err(SizewiseError::AllTiersExhausted {
            decision: decision.to_string(),
            attempts: attempts
                .iter()
                .map(|a| format!("{}: {}", a.tier, a.reason.as_deref().unwrap_or("failed")))
                .collect(),
        })
    }
}
