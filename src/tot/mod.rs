//! ToTManager (C6): owns the reasoning tree's nodes/edges and runs the
//! per-node expansion algorithm (spec §3, §4.6).

mod manager;
pub mod parse;
mod types;

pub use manager::{node_axiom_score, node_fact_quality, ExpansionOutcome, ToTManager};
pub use parse::{ParseOutcome, ParsedTriple};
pub use types::{NodeId, NodeStatus, ToTEdge, ToTNode};
