//! # sro-core
//!
//! The reasoning-and-knowledge core of the Sovereign Research Orchestrator:
//! Tree-of-Thought search over multi-variant Chain-of-Thought generations,
//! scored by a rule-based Process Reward Model and an axiom-grounded
//! Judge, explored by an augmented-UCB1 Monte Carlo Tree Search engine,
//! and grounded against a tiered Subject-Predicate-Object fact store.
//!
//! ## Core components
//!
//! - [`tot`]: the reasoning tree's node lifecycle and expansion algorithm
//! - [`mcts`]: the search loop that selects, expands, simulates, and
//!   backpropagates over the tree
//! - [`cot`]: multi-variant Chain-of-Thought generation and scoring
//! - [`prm`]: the rule-based Process Reward Model
//! - [`axiom`]: the Judge and the axiom library it evaluates against
//! - [`fact_store`]: the content-addressed, tier-promoted SPO fact store
//! - [`verify`]: conflict detection and the tier-promotion pipeline
//! - [`uncertainty`]: per-node epistemic uncertainty scoring
//! - [`session`]: session lifecycle, event log, and replay
//!
//! ## Example
//!
//! ```rust,ignore
//! use sro_core::{Session, SessionConfig, AxiomLibrary, FactStore, InMemoryFactPersistence};
//! use std::sync::Arc;
//!
//! # async fn run(model: &dyn sro_core::LanguageModel) -> sro_core::Result<()> {
//! let store = Arc::new(FactStore::new(Arc::new(InMemoryFactPersistence::new())));
//! let mut session = Session::start(
//!     "does solar pay for itself in ten years?",
//!     SessionConfig::default(),
//!     AxiomLibrary::empty(),
//!     store,
//! ).await?;
//! let status = session.run(model, &Default::default()).await?;
//! println!("session finished: {status:?}");
//! # Ok(())
//! # }
//! ```

// Self-alias for derive macro support within the crate
extern crate self as sro_core;

pub mod axiom;
pub mod capability;
pub mod config;
pub mod cot;
pub mod error;
pub mod fact_store;
pub mod mcts;
pub mod prm;
pub mod session;
pub mod tot;
pub mod uncertainty;
pub mod verify;

pub use axiom::{Axiom, AxiomId, AxiomJudge, AxiomLibrary, AxiomScore, ComparisonOp, JudgeInput, NumericValidator, SingleAxiomScore, Verdict};
pub use capability::{
    Cancel, CompletionOutcome, CompletionRequest, CostTracker, CostTrackingLanguageModel,
    LanguageModel, RetryPolicy, SourceAdapter, SourceEntry, SourceKind, with_retry,
};
pub use config::{PrmWeights, RewardWeights, SessionConfig, TierThresholds, UncertaintyWeights};
pub use cot::{CotBatch, CotGenerator, CotVariant, DEFAULT_APPROACHES};
pub use error::{Error, Result};
pub use fact_store::{
    ConflictId, ConflictKind, ConflictRecord, ConflictStatus, FactPersistence, FactStore,
    InMemoryFactPersistence, ObjectValue, SpoTriple, SqliteFactPersistence, Tier,
    TripleFingerprint, TripleQuery,
};
pub use mcts::{IterationRecord, MCTSEngine, SearchOutcome, TerminationReason};
pub use prm::{ProcessRewardModel, ReasoningStep, StepScore};
pub use session::{EventKind, EventLog, EventRecord, LogicalClock, Session, SessionStatus};
pub use tot::{NodeId, NodeStatus, ParseOutcome, ParsedTriple, ToTEdge, ToTManager, ToTNode};
pub use uncertainty::{InfoAction, InfoActionKind, UncertaintyEvaluator, UncertaintyReport};
pub use verify::{detect_conflicts, promote, resolve_conflict, run_promotion_pipeline};
