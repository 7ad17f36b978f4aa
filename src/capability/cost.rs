//! Token/cost accounting for `LanguageModel` calls (SPEC_FULL.md §0 ambient
//! stack). Grounded on rlm-core's `llm::types::CostTracker`, narrowed to
//! the fields this core's `CompletionOutcome` contract actually carries
//! (input/output token counts) — the core has no pricing table and no
//! per-provider model registry, so rlm-core's `by_model`/`total_cost`/
//! cache-token fields are dropped rather than faked.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::cancel::Cancel;
use super::language_model::{CompletionOutcome, CompletionRequest, LanguageModel};
use crate::error::Result;

/// Cumulative token usage across some number of `LanguageModel.complete`
/// calls. Plain data; accumulation happens through [`CostTrackingLanguageModel`]
/// or by calling [`CostTracker::record`] directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostTracker {
    pub total_tokens_in: u64,
    pub total_tokens_out: u64,
    pub request_count: u64,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &CompletionOutcome) {
        self.total_tokens_in += outcome.tokens_in as u64;
        self.total_tokens_out += outcome.tokens_out as u64;
        self.request_count += 1;
    }
}

/// A `LanguageModel` decorator that records every call's token usage into
/// a shared [`CostTracker`] before returning the inner model's outcome
/// unchanged. Lets a collaborator observe spend without the core itself
/// taking any opinion on pricing (spec §1 non-goals).
pub struct CostTrackingLanguageModel<'a> {
    inner: &'a dyn LanguageModel,
    tracker: Mutex<CostTracker>,
}

impl<'a> CostTrackingLanguageModel<'a> {
    pub fn new(inner: &'a dyn LanguageModel) -> Self {
        Self {
            inner,
            tracker: Mutex::new(CostTracker::new()),
        }
    }

    pub fn snapshot(&self) -> CostTracker {
        *self.tracker.lock().unwrap()
    }
}

#[async_trait]
impl<'a> LanguageModel for CostTrackingLanguageModel<'a> {
    async fn complete(&self, request: CompletionRequest, cancel: Cancel) -> Result<CompletionOutcome> {
        let outcome = self.inner.complete(request, cancel).await?;
        self.tracker.lock().unwrap().record(&outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::language_model::fakes::ScriptedLanguageModel;

    #[tokio::test]
    async fn wrapping_a_model_accumulates_token_counts_across_calls() {
        let inner = ScriptedLanguageModel::new();
        inner.script("hello", "a reply of some length");
        let tracked = CostTrackingLanguageModel::new(&inner);

        tracked
            .complete(CompletionRequest::new("hello", 0.1), Cancel::new())
            .await
            .unwrap();
        tracked
            .complete(CompletionRequest::new("hello", 0.1), Cancel::new())
            .await
            .unwrap();

        let snapshot = tracked.snapshot();
        assert_eq!(snapshot.request_count, 2);
        assert!(snapshot.total_tokens_in > 0);
        assert!(snapshot.total_tokens_out > 0);
    }

    #[tokio::test]
    async fn inner_model_outcome_passes_through_unchanged() {
        let inner = ScriptedLanguageModel::new();
        inner.script("q", "the answer");
        let tracked = CostTrackingLanguageModel::new(&inner);
        let outcome = tracked
            .complete(CompletionRequest::new("q", 0.1), Cancel::new())
            .await
            .unwrap();
        assert_eq!(outcome.text, "the answer");
    }
}
