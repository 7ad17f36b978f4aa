//! Axiom and AxiomScore types (spec §3).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxiomId(Uuid);

impl AxiomId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AxiomId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AxiomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Domain an axiom's pure validator accepts: either an SPO triple's
/// numeric object, or an arbitrary named field set extracted from a
/// ReasoningStep's implied claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AxiomDomain {
    /// A single named numeric quantity (e.g. `roi_years`).
    NumericField { name: String, value: f64 },
    /// No pure-validator domain; always falls through to the model path.
    None,
}

/// A user-defined principle with weight and penalty; enforced by the
/// Judge (spec §3, GLOSSARY). Immutable once loaded in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axiom {
    pub id: AxiomId,
    pub label: String,
    pub category: String,
    pub weight: f64,
    pub penalty: f64,
    pub rubric: String,
    /// The pure validator, represented as a closure over a named numeric
    /// field and threshold rather than an opaque function pointer so the
    /// type stays `Serialize`/`Deserialize` for axiom-file loading;
    /// `None` means this axiom only ever takes the model-based path.
    pub validator: Option<NumericValidator>,
}

/// A pure numeric validator: `field <op> threshold`. Kept deliberately
/// small — spec §3 only requires "an optional pure-function validator
/// (domain → bool) for numeric/structural constraints", and every
/// concrete example in the spec (`roi_years < 10`) is exactly this shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ComparisonOp {
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericValidator {
    pub field: String,
    pub op: ComparisonOp,
    pub threshold: f64,
}

impl NumericValidator {
    /// Evaluate the validator against a named-field value. Returns `None`
    /// if `field` does not match this validator's declared field (i.e.
    /// the input is outside this validator's domain, per spec §4.2 step 1
    /// "and the input is in its domain").
    pub fn evaluate(&self, field: &str, value: f64) -> Option<bool> {
        if field != self.field {
            return None;
        }
        Some(match self.op {
            ComparisonOp::LessThan => value < self.threshold,
            ComparisonOp::LessOrEqual => value <= self.threshold,
            ComparisonOp::GreaterThan => value > self.threshold,
            ComparisonOp::GreaterOrEqual => value >= self.threshold,
        })
    }
}

impl Axiom {
    pub fn new(label: impl Into<String>, category: impl Into<String>, weight: f64, penalty: f64, rubric: impl Into<String>) -> Self {
        Self {
            id: AxiomId::new(),
            label: label.into(),
            category: category.into(),
            weight: weight.clamp(0.0, 1.0),
            penalty: penalty.max(0.0),
            rubric: rubric.into(),
            validator: None,
        }
    }

    pub fn with_validator(mut self, validator: NumericValidator) -> Self {
        self.validator = Some(validator);
        self
    }
}

/// Verdict an axiom evaluation or PRM step scoring can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Supports,
    Neutral,
    Violates,
}

/// One axiom's signed score against a given input, with rationale
/// (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleAxiomScore {
    pub axiom_id: AxiomId,
    pub score: f64,
    pub verdict: Verdict,
    pub rationale: String,
}

/// A mapping from axiom identifier to signed score, plus the aggregated
/// weighted total (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxiomScore {
    pub scores: Vec<SingleAxiomScore>,
    pub total: f64,
}

impl AxiomScore {
    pub fn violations(&self) -> Vec<AxiomId> {
        self.scores
            .iter()
            .filter(|s| s.verdict == Verdict::Violates)
            .map(|s| s.axiom_id)
            .collect()
    }

    pub fn supports(&self) -> Vec<AxiomId> {
        self.scores
            .iter()
            .filter(|s| s.verdict == Verdict::Supports)
            .map(|s| s.axiom_id)
            .collect()
    }

    /// True when no axiom in this score reports `Violates` — the "no net
    /// violation" test the Silver → Gold promotion rule uses (spec §4.3).
    pub fn has_no_violation(&self) -> bool {
        self.total >= 0.0
    }
}
