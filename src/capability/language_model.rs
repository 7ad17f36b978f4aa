//! The `LanguageModel` capability (spec §6): the only abstract inference
//! boundary the core consumes. Grounded on rlm-core's `LLMClient` trait
//! (`llm::client`), narrowed to the single `complete` contract the spec
//! names rather than rlm-core's full multi-provider client surface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cancel::Cancel;
use crate::error::Result;

/// A single completion request. Must be deterministic for fixed
/// `(prompt, system, temperature, stop)` when the backend is seedable
/// (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub stop: Vec<String>,
    pub deadline: Option<DateTime<Utc>>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, temperature: f64) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            temperature,
            max_output_tokens: 1024,
            stop: Vec::new(),
            deadline: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// The text and token accounting returned by a completion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOutcome {
    pub text: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

/// Abstract inference backend. The core never talks to a provider
/// directly; every PRM/axiom/variant call goes through this trait so the
/// core can be driven by a deterministic fake in tests (spec §9).
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest, cancel: Cancel) -> Result<CompletionOutcome>;
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// A scripted, deterministic `LanguageModel` fake: returns a fixed
    /// response per prompt, or an echo of the prompt if unscripted.
    /// Grounded on rlm-core's pattern of deterministic test doubles for
    /// `LLMClient` in `orchestrator.rs`'s fallback-loop tests.
    pub struct ScriptedLanguageModel {
        responses: Mutex<HashMap<String, String>>,
        pub calls: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLanguageModel {
        pub fn new() -> Self {
            Self {
                responses: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn script(&self, prompt: impl Into<String>, response: impl Into<String>) {
            self.responses
                .lock()
                .unwrap()
                .insert(prompt.into(), response.into());
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedLanguageModel {
        async fn complete(&self, request: CompletionRequest, _cancel: Cancel) -> Result<CompletionOutcome> {
            let text = self
                .responses
                .lock()
                .unwrap()
                .get(&request.prompt)
                .cloned()
                .unwrap_or_else(|| request.prompt.clone());
            let tokens_in = (request.prompt.len() / 4).max(1) as u32;
            let tokens_out = (text.len() / 4).max(1) as u32;
            self.calls.lock().unwrap().push(request);
            Ok(CompletionOutcome {
                text,
                tokens_in,
                tokens_out,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::ScriptedLanguageModel;
    use super::*;

    #[tokio::test]
    async fn scripted_model_is_deterministic_for_fixed_prompt() {
        let model = ScriptedLanguageModel::new();
        model.script("hello", "world");
        let req = CompletionRequest::new("hello", 0.1);
        let first = model.complete(req.clone(), Cancel::new()).await.unwrap();
        let second = model.complete(req, Cancel::new()).await.unwrap();
        assert_eq!(first.text, second.text);
        assert_eq!(first.text, "world");
    }
}
