//! AxiomLibrary & AxiomJudge (C2): load, evaluate, and aggregate axiom
//! scores against claims/steps (spec §4.2).

mod judge;
mod library;
mod types;

pub use judge::{AxiomJudge, JudgeInput};
pub use library::AxiomLibrary;
pub use types::{Axiom, AxiomId, AxiomScore, ComparisonOp, NumericValidator, SingleAxiomScore, Verdict};
