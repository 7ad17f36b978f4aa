//! CoTGenerator (C5): dispatches exactly N chain-of-thought variants per
//! expansion, each through a distinct (approach, temperature) pair, scores
//! every step via `ProcessRewardModel`, and applies the retry-once-then-
//! synthesize-"no-output" policy on empty results (spec §4.5). Grounded on
//! rlm-core's `llm::batch::BatchExecutor::execute` order-preserving
//! parallel-dispatch pattern, narrowed from a semaphore-bounded batch
//! queue to a fixed-width `join_all` over exactly `variant_count` futures.

mod types;

pub use types::{CotBatch, CotVariant};

use futures::future::join_all;

use crate::axiom::AxiomLibrary;
use crate::capability::{Cancel, CompletionRequest, LanguageModel};
use crate::config::PrmWeights;
use crate::error::Result;
use crate::prm::{ProcessRewardModel, ReasoningStep};

/// The fixed approach labels cycled across variants when the caller
/// supplies more temperatures than approach names, or vice versa (spec
/// §4.5 defaults: analytical@0.7, empirical@0.8, theoretical@0.9).
pub const DEFAULT_APPROACHES: &[&str] = &["analytical", "empirical", "theoretical"];

/// Generates and scores a session's chain-of-thought variants for a
/// single ToT expansion.
pub struct CotGenerator<'a> {
    library: &'a AxiomLibrary,
    prm_weights: PrmWeights,
}

impl<'a> CotGenerator<'a> {
    pub fn new(library: &'a AxiomLibrary, prm_weights: PrmWeights) -> Self {
        Self { library, prm_weights }
    }

    /// Generate exactly `temperatures.len()` variants for `prompt`, one
    /// per `(approach, temperature)` pair, dispatched concurrently via
    /// `join_all` (order-preserving regardless of completion order —
    /// spec §9: CoT dispatch is an unordered best-effort parallel fan-out
    /// whose *results* remain ordered).
    pub async fn generate(
        &self,
        prompt: &str,
        approaches: &[&str],
        temperatures: &[f64],
        model: &dyn LanguageModel,
        judge_temperature: f64,
    ) -> Result<CotBatch> {
        let futures = temperatures.iter().enumerate().map(|(i, temperature)| {
            let approach = approaches[i % approaches.len()].to_string();
            self.generate_one(prompt, approach, *temperature, model, judge_temperature)
        });

        let results = join_all(futures).await;
        let mut variants = Vec::with_capacity(results.len());
        for result in results {
            variants.push(result?);
        }
        Ok(CotBatch { variants })
    }

    async fn generate_one(
        &self,
        prompt: &str,
        approach: String,
        temperature: f64,
        model: &dyn LanguageModel,
        judge_temperature: f64,
    ) -> Result<CotVariant> {
        let steps = self.complete_with_retry(prompt, &approach, temperature, model).await?;

        if steps.is_empty() {
            tracing::warn!(approach = %approach, temperature, "CoT variant produced no output after retry");
            let no_output = ReasoningStep::new("no-output");
            let zero_score = crate::prm::StepScore::new(0.0, 0.0, 0.0, self.prm_weights);
            return Ok(CotVariant {
                approach,
                temperature,
                steps: vec![no_output],
                step_scores: vec![zero_score],
                conclusion: "no-output".to_string(),
                is_synthetic_no_output: true,
            });
        }

        let prm = ProcessRewardModel::new(self.library, self.prm_weights);
        let mut step_scores = Vec::with_capacity(steps.len());
        for step in &steps {
            step_scores.push(prm.score(step, model, judge_temperature).await?);
        }
        let conclusion = steps.last().map(|s| s.text.clone()).unwrap_or_default();

        Ok(CotVariant {
            approach,
            temperature,
            steps,
            step_scores,
            conclusion,
            is_synthetic_no_output: false,
        })
    }

    /// Calls the model once; if it returns an empty completion, retries
    /// exactly once before giving up (spec §4.5's "no-output" policy —
    /// the caller maps an empty `Vec` into a synthetic variant).
    async fn complete_with_retry(
        &self,
        prompt: &str,
        approach: &str,
        temperature: f64,
        model: &dyn LanguageModel,
    ) -> Result<Vec<ReasoningStep>> {
        for _attempt in 0..2 {
            let request = CompletionRequest::new(format!("[{approach}] {prompt}"), temperature);
            let outcome = model.complete(request, Cancel::new()).await?;
            let steps = split_into_steps(&outcome.text);
            if !steps.is_empty() {
                return Ok(steps);
            }
        }
        Ok(Vec::new())
    }
}

/// Splits a completion's text into non-empty reasoning steps, one per
/// line. A model-response format decision, not a spec-mandated parser:
/// CoT completions in this domain are line-delimited step lists.
fn split_into_steps(text: &str) -> Vec<ReasoningStep> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ReasoningStep::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::language_model::fakes::ScriptedLanguageModel;

    #[tokio::test]
    async fn generates_exactly_n_variants_for_n_temperatures() {
        let library = AxiomLibrary::empty();
        let generator = CotGenerator::new(&library, PrmWeights::default());
        let model = ScriptedLanguageModel::new();
        let batch = generator
            .generate("evaluate solar ROI", DEFAULT_APPROACHES, &[0.7, 0.8, 0.9], &model, 0.1)
            .await
            .unwrap();
        assert_eq!(batch.variants.len(), 3);
        assert_eq!(batch.variants[0].approach, "analytical");
        assert_eq!(batch.variants[1].approach, "empirical");
        assert_eq!(batch.variants[2].approach, "theoretical");
    }

    #[tokio::test]
    async fn empty_completion_on_both_attempts_yields_synthetic_no_output() {
        let library = AxiomLibrary::empty();
        let generator = CotGenerator::new(&library, PrmWeights::default());
        let model = ScriptedLanguageModel::new();
        model.script("[analytical] prompt", "");
        let batch = generator
            .generate("prompt", DEFAULT_APPROACHES, &[0.7], &model, 0.1)
            .await
            .unwrap();
        assert!(batch.variants[0].is_synthetic_no_output);
        assert_eq!(batch.variants[0].aggregate_score(), 0.0);
    }

    #[tokio::test]
    async fn non_empty_completion_is_split_into_steps() {
        let library = AxiomLibrary::empty();
        let generator = CotGenerator::new(&library, PrmWeights::default());
        let model = ScriptedLanguageModel::new();
        model.script(
            "[analytical] prompt",
            "Research shows a 12% improvement.\nTherefore the approach is sound.",
        );
        let batch = generator
            .generate("prompt", DEFAULT_APPROACHES, &[0.7], &model, 0.1)
            .await
            .unwrap();
        assert_eq!(batch.variants[0].steps.len(), 2);
        assert!(!batch.variants[0].is_synthetic_no_output);
    }
}
