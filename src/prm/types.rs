//! ReasoningStep and StepScore types (spec §4.4).

use serde::{Deserialize, Serialize};

/// A single step of free-form reasoning text to be scored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub text: String,
}

impl ReasoningStep {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// The three-dimensional score the PRM assigns a `ReasoningStep`, plus
/// the weighted composite (spec §4.4: `overall = 0.4*axiom + 0.4*logic +
/// 0.2*evidence`, weights configurable via `SessionConfig.prm_weights`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepScore {
    pub axiom: f64,
    pub logic: f64,
    pub evidence: f64,
    pub overall: f64,
}

impl StepScore {
    pub fn new(axiom: f64, logic: f64, evidence: f64, weights: crate::config::PrmWeights) -> Self {
        let overall = weights.axiom * axiom + weights.logic * logic + weights.evidence * evidence;
        Self {
            axiom,
            logic,
            evidence,
            overall,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrmWeights;

    #[test]
    fn overall_combines_via_default_weights() {
        let score = StepScore::new(1.0, 1.0, 0.0, PrmWeights::default());
        assert!((score.overall - 0.8).abs() < 1e-9);
    }
}
