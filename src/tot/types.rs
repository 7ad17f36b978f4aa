//! ToT node/edge types (spec §3, §4.6).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cot::CotVariant;
use crate::fact_store::TripleFingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The node lifecycle (spec §4.6): `created → expanding → expanded →
/// (terminal | pruned)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum NodeStatus {
    Created,
    Expanding,
    Expanded,
    Pruned,
    Terminal,
}

/// A node in the reasoning tree (spec §3). Holds everything MCTS needs
/// (`visits`/`cumulative_reward`/`prior`) alongside the expansion record
/// (`variants`/`selected_variant`/`spo_fingerprints`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToTNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub question: String,
    pub depth: u32,
    pub status: NodeStatus,
    pub variants: Vec<CotVariant>,
    pub selected_variant: Option<usize>,
    pub spo_fingerprints: Vec<TripleFingerprint>,
    pub visits: u64,
    pub cumulative_reward: f64,
    pub prior: f64,
    pub coverage: f64,
    pub axiom_alignment: f64,
}

impl ToTNode {
    pub fn root(question: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            parent: None,
            question: question.into(),
            depth: 0,
            status: NodeStatus::Created,
            variants: Vec::new(),
            selected_variant: None,
            spo_fingerprints: Vec::new(),
            visits: 0,
            cumulative_reward: 0.0,
            prior: 0.0,
            coverage: 0.0,
            axiom_alignment: 0.0,
        }
    }

    pub fn child(parent: NodeId, depth: u32, question: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            parent: Some(parent),
            question: question.into(),
            depth,
            status: NodeStatus::Created,
            variants: Vec::new(),
            selected_variant: None,
            spo_fingerprints: Vec::new(),
            visits: 0,
            cumulative_reward: 0.0,
            prior: 0.0,
            coverage: 0.0,
            axiom_alignment: 0.0,
        }
    }

    /// Mean reward `Q(n)/N(n)`; 0.0 for an unvisited node (spec §4.7).
    pub fn mean_reward(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.cumulative_reward / self.visits as f64
        }
    }

    pub fn selected_variant(&self) -> Option<&CotVariant> {
        self.selected_variant.and_then(|i| self.variants.get(i))
    }
}

/// Parent-child link with a decomposition label (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToTEdge {
    pub parent: NodeId,
    pub child: NodeId,
    pub label: String,
}
