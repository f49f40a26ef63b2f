//! Structured, append-only decision explanations.
//!
//! Every component touched by a decision contributes [`ExplanationStep`]s
//! to one [`ExplanationTrace`]. Steps are never edited or removed once
//! pushed; the trace only exposes read access to them.

mod recorder;

pub use recorder::ExplanationRecorder;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// A named input or output value of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepValue {
    /// Numeric value
    Number(f32),
    /// Boolean flag
    Flag(bool),
    /// Text, codes and names
    Text(String),
}

impl From<f32> for StepValue {
    fn from(v: f32) -> Self {
        Self::Number(v)
    }
}

impl From<u8> for StepValue {
    fn from(v: u8) -> Self {
        Self::Number(f32::from(v))
    }
}

impl From<usize> for StepValue {
    fn from(v: usize) -> Self {
        Self::Number(v as f32)
    }
}

impl From<bool> for StepValue {
    fn from(v: bool) -> Self {
        Self::Flag(v)
    }
}

impl From<&str> for StepValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for StepValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl fmt::Display for StepValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v:.2}"),
            Self::Flag(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// How a step moved the decision's confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ConfidenceImpact {
    /// Informational step
    None,
    /// Signed change, e.g. a demotion penalty
    Delta(f32),
    /// Confidence set outright by this step
    Absolute(f32),
    /// Multiplicative factor, e.g. a fit adjustment
    Factor(f32),
}

/// One recorded step of a decision.
///
/// # Examples
///
/// ```
/// use sizewise::explain::{ConfidenceImpact, ExplanationStep};
///
/// let step = ExplanationStep::new("skirt_waist_rule")
///     .input("waist_cm", 59.2_f32)
///     .output(61.2_f32)
///     .reasoning("skirt waist = body waist + 2.0 cm ease")
///     .impact(ConfidenceImpact::Absolute(0.9));
/// assert_eq!(step.step_name(), "skirt_waist_rule");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationStep {
    step_name: String,
    inputs: BTreeMap<String, StepValue>,
    output: Option<StepValue>,
    reasoning: String,
    confidence_impact: ConfidenceImpact,
    recorded_at: DateTime<Utc>,
}

impl ExplanationStep {
    /// Starts a step.
    #[must_use]
    pub fn new(step_name: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            inputs: BTreeMap::new(),
            output: None,
            reasoning: String::new(),
            confidence_impact: ConfidenceImpact::None,
            recorded_at: Utc::now(),
        }
    }

    /// Adds a named input.
    #[must_use]
    pub fn input(mut self, name: impl Into<String>, value: impl Into<StepValue>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    /// Sets the output.
    #[must_use]
    pub fn output(mut self, value: impl Into<StepValue>) -> Self {
        self.output = Some(value.into());
        self
    }

    /// Sets the reasoning text.
    #[must_use]
    pub fn reasoning(mut self, text: impl Into<String>) -> Self {
        self.reasoning = text.into();
        self
    }

    /// Sets the confidence impact.
    #[must_use]
    pub fn impact(mut self, impact: ConfidenceImpact) -> Self {
        self.confidence_impact = impact;
        self
    }

    /// Step name.
    #[must_use]
    pub fn step_name(&self) -> &str {
        &self.step_name
    }

    /// Named inputs.
    #[must_use]
    pub fn inputs(&self) -> &BTreeMap<String, StepValue> {
        &self.inputs
    }

    /// Output value.
    #[must_use]
    pub fn output_value(&self) -> Option<&StepValue> {
        self.output.as_ref()
    }

    /// Reasoning text.
    #[must_use]
    pub fn reasoning_text(&self) -> &str {
        &self.reasoning
    }

    /// Confidence impact.
    #[must_use]
    pub fn confidence_impact(&self) -> ConfidenceImpact {
        self.confidence_impact
    }

    /// Creation time.
    #[must_use]
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}

/// Kind of decision a trace explains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    /// Size recommendation
    Size,
    /// Measurement prediction
    Measurement,
}

impl DecisionType {
    /// Both kinds.
    pub const ALL: [Self; 2] = [Self::Size, Self::Measurement];

    /// Lower-case tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Measurement => "measurement",
        }
    }
}

impl fmt::Display for DecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a method that was evaluated alongside the chosen one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeComparison {
    /// Method tag
    pub method: String,
    /// What that method produced
    pub value: StepValue,
    /// Its confidence
    pub confidence: f32,
    /// Whether it agrees with the final decision
    pub agrees: bool,
}

/// Full record of one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationTrace {
    decision_id: Uuid,
    session_id: Option<String>,
    decision_type: DecisionType,
    created_at: DateTime<Utc>,
    steps: Vec<ExplanationStep>,
    feature_contributions: BTreeMap<String, f32>,
    alternatives: Vec<AlternativeComparison>,
    data_quality_notes: Vec<String>,
    method: Option<String>,
    final_confidence: Option<f32>,
}

impl ExplanationTrace {
    /// Starts an empty trace with a fresh decision id.
    #[must_use]
    pub fn new(decision_type: DecisionType, session_id: Option<String>) -> Self {
        Self {
            decision_id: Uuid::new_v4(),
            session_id,
            decision_type,
            created_at: Utc::now(),
            steps: Vec::new(),
            feature_contributions: BTreeMap::new(),
            alternatives: Vec::new(),
            data_quality_notes: Vec::new(),
            method: None,
            final_confidence: None,
        }
    }

    /// Appends a step.
    pub fn push_step(&mut self, step: ExplanationStep) {
        self.steps.push(step);
    }

    /// Appends steps in order.
    pub fn extend_steps(&mut self, steps: impl IntoIterator<Item = ExplanationStep>) {
        self.steps.extend(steps);
    }

    /// Records a feature contribution snapshot entry.
    pub fn add_feature_contribution(&mut self, feature: impl Into<String>, value: f32) {
        self.feature_contributions.insert(feature.into(), value);
    }

    /// Records an alternative method's result.
    pub fn add_alternative(&mut self, alternative: AlternativeComparison) {
        self.alternatives.push(alternative);
    }

    /// Records a data-quality note.
    pub fn add_note(&mut self, note: impl Into<String>) {
        self.data_quality_notes.push(note.into());
    }

    /// Records the outcome.
    pub fn finish(&mut self, method: impl Into<String>, confidence: f32) {
        self.method = Some(method.into());
        self.final_confidence = Some(confidence);
    }

    /// Decision id.
    #[must_use]
    pub fn decision_id(&self) -> Uuid {
        self.decision_id
    }

    /// Session id, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Decision type.
    #[must_use]
    pub fn decision_type(&self) -> DecisionType {
        self.decision_type
    }

    /// Creation time.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Steps in insertion order.
    #[must_use]
    pub fn steps(&self) -> &[ExplanationStep] {
        &self.steps
    }

    /// Feature contribution snapshot.
    #[must_use]
    pub fn feature_contributions(&self) -> &BTreeMap<String, f32> {
        &self.feature_contributions
    }

    /// Alternatives evaluated.
    #[must_use]
    pub fn alternatives(&self) -> &[AlternativeComparison] {
        &self.alternatives
    }

    /// Data-quality notes.
    #[must_use]
    pub fn data_quality_notes(&self) -> &[String] {
        &self.data_quality_notes
    }

    /// Method that produced the final value.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Final confidence.
    #[must_use]
    pub fn final_confidence(&self) -> Option<f32> {
        self.final_confidence
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
