//! CoT variant and aggregate types (spec §4.5).

use serde::{Deserialize, Serialize};

use crate::prm::{ReasoningStep, StepScore};

/// One candidate chain-of-thought variant: a fixed (approach, temperature)
/// pair, the steps it produced, and the per-step scores the caller fills
/// in after PRM scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CotVariant {
    pub approach: String,
    pub temperature: f64,
    pub steps: Vec<ReasoningStep>,
    pub step_scores: Vec<StepScore>,
    /// The variant's concluding claim (spec §3): the text of its final
    /// step, or the synthetic placeholder for a no-output variant.
    pub conclusion: String,
    /// Set when the LLM returned no usable output on both the first
    /// attempt and the single retry (spec §4.5 "no-output" policy).
    pub is_synthetic_no_output: bool,
}

impl CotVariant {
    /// Mean of `step_scores[].overall`; 0.0 for a synthetic no-output
    /// variant, which always sorts last (spec §4.5, §8).
    pub fn aggregate_score(&self) -> f64 {
        if self.step_scores.is_empty() {
            return 0.0;
        }
        self.step_scores.iter().map(|s| s.overall).sum::<f64>() / self.step_scores.len() as f64
    }

    /// True if any step scored below the violation floor (spec §4.5:
    /// "flag the variant as a violation if any step's overall score falls
    /// below 0.3").
    pub fn has_violation(&self) -> bool {
        self.step_scores.iter().any(|s| s.overall < 0.3)
    }
}

/// The full set of variants generated for one ToT node expansion
/// (spec §4.5: "generate exactly N diverse variants").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CotBatch {
    pub variants: Vec<CotVariant>,
}

impl CotBatch {
    /// Selects the best variant by deterministic tie-break (spec §4.6):
    /// fewest violations, then declared approach order, then insertion
    /// order. `approach_order` gives each approach's rank (lower wins
    /// ties); approaches absent from it sort after all ranked ones.
    pub fn select_best<'a>(&'a self, approach_order: &[&str]) -> Option<&'a CotVariant> {
        self.variants.iter().enumerate().max_by(|(ia, a), (ib, b)| {
            // Higher aggregate score wins first.
            a.aggregate_score()
                .partial_cmp(&b.aggregate_score())
                .unwrap_or(std::cmp::Ordering::Equal)
                // Fewer violations is better: invert the bool comparison.
                .then_with(|| (!a.has_violation()).cmp(&(!b.has_violation())))
                // Declared approach order: earlier rank wins, so compare
                // in reverse (max_by picks the greatest).
                .then_with(|| {
                    let rank_a = approach_order.iter().position(|x| *x == a.approach);
                    let rank_b = approach_order.iter().position(|x| *x == b.approach);
                    rank_b.cmp(&rank_a)
                })
                // Earlier insertion index wins: compare indices in reverse.
                .then_with(|| ib.cmp(ia))
        }).map(|(_, v)| v)
    }
}
