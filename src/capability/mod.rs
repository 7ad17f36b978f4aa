//! Capability contracts consumed by the core (spec §6): `LanguageModel`,
//! `SourceAdapter`, and the `FactPersistence` boundary used by
//! [`crate::fact_store`]. These are narrow `async_trait` contracts, callable
//! from multiple tasks, and opaque to the core — testable with in-memory
//! fakes, per spec §9.

mod cancel;
mod cost;
pub(crate) mod language_model;
mod retry;
pub(crate) mod source_adapter;

pub use cancel::Cancel;
pub use cost::{CostTracker, CostTrackingLanguageModel};
pub use language_model::{CompletionOutcome, CompletionRequest, LanguageModel};
pub use retry::{with_retry, RetryPolicy};
pub use source_adapter::{SourceAdapter, SourceEntry, SourceKind};
