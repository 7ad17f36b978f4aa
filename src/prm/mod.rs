//! ProcessRewardModel (C4): scores a `ReasoningStep` in three dimensions —
//! axiom-compliance (delegated to `AxiomJudge`), logical-consistency and
//! evidence-strength (rule-based heuristics) — and combines them into a
//! composite `overall` via `SessionConfig.prm_weights` (spec §4.4).

mod heuristics;
mod types;

pub use heuristics::{evidence_strength, logical_consistency};
pub use types::{ReasoningStep, StepScore};

use crate::axiom::{AxiomJudge, AxiomLibrary, JudgeInput};
use crate::capability::LanguageModel;
use crate::config::PrmWeights;
use crate::error::Result;

/// Scores `ReasoningStep`s against a session's frozen `AxiomLibrary`.
/// Cheap and deterministic for the logic/evidence dimensions; the axiom
/// dimension is delegated to whatever mix of pure validators and
/// model-based rubric evaluation the library's axioms call for.
pub struct ProcessRewardModel<'a> {
    library: &'a AxiomLibrary,
    weights: PrmWeights,
}

impl<'a> ProcessRewardModel<'a> {
    pub fn new(library: &'a AxiomLibrary, weights: PrmWeights) -> Self {
        Self { library, weights }
    }

    /// Score a single step. Axiom-compliance always takes the textual
    /// rubric path here: a `ReasoningStep` is free-form prose, and
    /// extracting a structured subject/predicate/object claim from
    /// arbitrary English text to feed a pure `NumericValidator` is the
    /// job of `tot::parse`'s stricter SPO-extraction-with-rejection-rules
    /// (spec §4.6 step 4), not this component — PRM only ever sees the
    /// text a ToT node has already committed to.
    pub async fn score(&self, step: &ReasoningStep, model: &dyn LanguageModel, judge_temperature: f64) -> Result<StepScore> {
        let judge = AxiomJudge::new(self.library);
        let judge_input = JudgeInput::text_only(step.text.clone());
        let axiom_score = judge.evaluate(&judge_input, model, judge_temperature).await?;
        let axiom_component = self.normalized_axiom_component(axiom_score.total);

        let logic = logical_consistency(&step.text);
        let evidence = evidence_strength(&step.text);

        Ok(StepScore::new(axiom_component, logic, evidence, self.weights))
    }

    /// Map the library's unbounded signed weighted total into [0,1] by
    /// normalizing against the sum of axiom weights (the total's maximum
    /// possible magnitude when every axiom fully supports or fully
    /// violates) and rescaling from [-1,1].
    fn normalized_axiom_component(&self, total: f64) -> f64 {
        let total_weight: f64 = self.library.axioms().iter().map(|a| a.weight).sum();
        if total_weight <= 0.0 {
            return 0.5;
        }
        let normalized = (total / total_weight).clamp(-1.0, 1.0);
        (normalized + 1.0) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axiom::{Axiom, ComparisonOp, NumericValidator};
    use crate::capability::language_model::fakes::ScriptedLanguageModel;

    #[tokio::test]
    async fn weak_language_step_has_low_overall() {
        let library = AxiomLibrary::empty();
        let prm = ProcessRewardModel::new(&library, PrmWeights::default());
        let model = ScriptedLanguageModel::new();
        let step = ReasoningStep::new("I think maybe renewable energy is probably good.");
        let score = prm.score(&step, &model, 0.1).await.unwrap();
        assert_eq!(score.evidence, 0.0);
        assert!(score.overall <= 0.4, "{}", score.overall);
    }

    #[tokio::test]
    async fn strong_evidence_step_scores_higher_than_weak_one() {
        let library = AxiomLibrary::empty();
        let prm = ProcessRewardModel::new(&library, PrmWeights::default());
        let model = ScriptedLanguageModel::new();
        let weak = ReasoningStep::new("I think maybe this is probably fine.");
        let strong = ReasoningStep::new("Research from NREL shows a 40% emissions reduction.");
        let weak_score = prm.score(&weak, &model, 0.1).await.unwrap();
        let strong_score = prm.score(&strong, &model, 0.1).await.unwrap();
        assert!(strong_score.overall > weak_score.overall);
    }

    #[tokio::test]
    async fn empty_library_yields_neutral_axiom_component() {
        let library = AxiomLibrary::empty();
        let prm = ProcessRewardModel::new(&library, PrmWeights::default());
        let model = ScriptedLanguageModel::new();
        let step = ReasoningStep::new("A plain step with no strong signal either way.");
        let score = prm.score(&step, &model, 0.1).await.unwrap();
        assert_eq!(score.axiom, 0.5);
    }

    #[tokio::test]
    async fn step_text_has_no_numeric_fields_so_falls_through_to_model_path() {
        let axiom = Axiom::new("roi", "financial", 1.0, 1.0, "roi under 10 years").with_validator(
            NumericValidator {
                field: "roi_years".to_string(),
                op: ComparisonOp::LessThan,
                threshold: 10.0,
            },
        );
        let library = AxiomLibrary::load(vec![axiom]).unwrap();
        let prm = ProcessRewardModel::new(&library, PrmWeights::default());
        let model = ScriptedLanguageModel::new();
        let step = ReasoningStep::new("A step whose implied claim is not numeric at all.");
        let score = prm.score(&step, &model, 0.1).await.unwrap();
        assert_eq!(score.axiom, 0.5);
    }
}
