//! AxiomJudge: evaluates a triple or ReasoningStep against every enabled
//! axiom and aggregates (spec §4.2). Grounded on rlm-core's
//! `adversarial::validator` "LLM evaluates via structured prompt → parse
//! response → confidence-filtered result, falling back gracefully on
//! parse failure" protocol, narrowed to the Judge's fixed
//! `{score, verdict, rationale}` contract.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::warn;

use crate::axiom::library::AxiomLibrary;
use crate::axiom::types::{AxiomScore, SingleAxiomScore, Verdict};
use crate::capability::{Cancel, CompletionRequest, LanguageModel};
use crate::error::Result;

/// Input to the Judge: the numeric fields parsed from a triple/claim (for
/// the pure-validator path) plus the free text used for the model-based
/// rubric path (spec §4.2 step 1 vs step 2).
#[derive(Debug, Clone, Default)]
pub struct JudgeInput {
    pub numeric_fields: HashMap<String, f64>,
    pub text: String,
}

impl JudgeInput {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            numeric_fields: HashMap::new(),
            text: text.into(),
        }
    }

    pub fn with_numeric_field(mut self, field: impl Into<String>, value: f64) -> Self {
        self.numeric_fields.insert(field.into(), value);
        self
    }
}

#[derive(Debug, Deserialize)]
struct ModelJudgeResponse {
    score: f64,
    verdict: String,
    rationale: String,
}

fn parse_verdict(s: &str) -> Option<Verdict> {
    match s.to_ascii_lowercase().as_str() {
        "supports" => Some(Verdict::Supports),
        "neutral" => Some(Verdict::Neutral),
        "violates" => Some(Verdict::Violates),
        _ => None,
    }
}

/// Scores a `JudgeInput` against every axiom in `library` and aggregates
/// (spec §4.2). Pure with respect to its inputs: the same axioms, input,
/// and model response yield the same `AxiomScore`.
pub struct AxiomJudge<'a> {
    library: &'a AxiomLibrary,
}

impl<'a> AxiomJudge<'a> {
    pub fn new(library: &'a AxiomLibrary) -> Self {
        Self { library }
    }

    pub async fn evaluate(
        &self,
        input: &JudgeInput,
        model: &dyn LanguageModel,
        judge_temperature: f64,
    ) -> Result<AxiomScore> {
        let mut scores = Vec::with_capacity(self.library.len());

        for axiom in self.library.axioms() {
            let validator_result = axiom.validator.as_ref().and_then(|validator| {
                input
                    .numeric_fields
                    .get(&validator.field)
                    .and_then(|value| validator.evaluate(&validator.field, *value))
            });

            let single = match validator_result {
                Some(true) => SingleAxiomScore {
                    axiom_id: axiom.id,
                    score: axiom.weight,
                    verdict: Verdict::Supports,
                    rationale: format!("{} passed its validator", axiom.label),
                },
                Some(false) => SingleAxiomScore {
                    axiom_id: axiom.id,
                    score: -axiom.penalty,
                    verdict: Verdict::Violates,
                    rationale: format!("{} failed its validator", axiom.label),
                },
                None => self.evaluate_via_model(axiom, input, model, judge_temperature).await,
            };
            scores.push(single);
        }

        let total: f64 = scores
            .iter()
            .zip(self.library.axioms())
            .map(|(s, axiom)| axiom.weight * s.score)
            .sum();

        Ok(AxiomScore { scores, total })
    }

    async fn evaluate_via_model(
        &self,
        axiom: &crate::axiom::types::Axiom,
        input: &JudgeInput,
        model: &dyn LanguageModel,
        judge_temperature: f64,
    ) -> SingleAxiomScore {
        let prompt = format!(
            "Axiom: {}\nRubric: {}\nClaim: {}\nRespond with JSON: {{\"score\": <f64 in [-1,1]>, \"verdict\": \"supports|neutral|violates\", \"rationale\": \"...\"}}",
            axiom.label, axiom.rubric, input.text
        );
        let request = CompletionRequest::new(prompt, judge_temperature);
        let outcome = match model.complete(request, Cancel::new()).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(axiom = %axiom.label, error = %err, "axiom judge model call failed");
                return SingleAxiomScore {
                    axiom_id: axiom.id,
                    score: 0.0,
                    verdict: Verdict::Neutral,
                    rationale: "model call failed".to_string(),
                };
            }
        };

        match serde_json::from_str::<ModelJudgeResponse>(&outcome.text)
            .ok()
            .and_then(|parsed| parse_verdict(&parsed.verdict).map(|v| (parsed, v)))
        {
            Some((parsed, verdict)) => SingleAxiomScore {
                axiom_id: axiom.id,
                score: parsed.score.clamp(-1.0, 1.0),
                verdict,
                rationale: parsed.rationale,
            },
            None => {
                warn!(axiom = %axiom.label, response = %outcome.text, "axiom judge response failed to parse");
                SingleAxiomScore {
                    axiom_id: axiom.id,
                    score: 0.0,
                    verdict: Verdict::Neutral,
                    rationale: "unparseable model response".to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axiom::library::AxiomLibrary;
    use crate::axiom::types::{Axiom, ComparisonOp, NumericValidator};
    use crate::capability::language_model::fakes::ScriptedLanguageModel;

    #[tokio::test]
    async fn validator_false_produces_negative_penalty_exactly() {
        let axiom = Axiom::new("roi", "financial", 1.0, 5.0, "roi under 10 years").with_validator(
            NumericValidator {
                field: "roi_years".to_string(),
                op: ComparisonOp::LessThan,
                threshold: 10.0,
            },
        );
        let library = AxiomLibrary::load(vec![axiom]).unwrap();
        let judge = AxiomJudge::new(&library);
        let input = JudgeInput::default().with_numeric_field("roi_years", 12.0);
        let model = ScriptedLanguageModel::new();
        let score = judge.evaluate(&input, &model, 0.1).await.unwrap();
        assert_eq!(score.scores[0].score, -5.0);
        assert_eq!(score.scores[0].verdict, Verdict::Violates);
    }

    #[tokio::test]
    async fn validator_true_produces_positive_weight_exactly() {
        let axiom = Axiom::new("roi", "financial", 1.0, 5.0, "roi under 10 years").with_validator(
            NumericValidator {
                field: "roi_years".to_string(),
                op: ComparisonOp::LessThan,
                threshold: 10.0,
            },
        );
        let library = AxiomLibrary::load(vec![axiom]).unwrap();
        let judge = AxiomJudge::new(&library);
        let input = JudgeInput::default().with_numeric_field("roi_years", 7.94);
        let model = ScriptedLanguageModel::new();
        let score = judge.evaluate(&input, &model, 0.1).await.unwrap();
        assert_eq!(score.scores[0].score, 1.0);
        assert_eq!(score.total, 1.0);
    }

    #[tokio::test]
    async fn unparseable_model_response_yields_neutral_zero() {
        let axiom = Axiom::new("tone", "style", 0.5, 1.0, "is the tone respectful?");
        let library = AxiomLibrary::load(vec![axiom]).unwrap();
        let judge = AxiomJudge::new(&library);
        let input = JudgeInput::text_only("some claim");
        let model = ScriptedLanguageModel::new();
        model.script(
            "Axiom: tone\nRubric: is the tone respectful?\nClaim: some claim\nRespond with JSON: {\"score\": <f64 in [-1,1]>, \"verdict\": \"supports|neutral|violates\", \"rationale\": \"...\"}",
            "not json at all",
        );
        let score = judge.evaluate(&input, &model, 0.1).await.unwrap();
        assert_eq!(score.scores[0].score, 0.0);
        assert_eq!(score.scores[0].verdict, Verdict::Neutral);
    }
}
