//! MCTS selection/termination types (spec §4.7).

use serde::{Deserialize, Serialize};

use crate::tot::NodeId;

/// Why an MCTS run stopped (spec §4.7: iteration budget, convergence
/// streak, or every leaf terminal/pruned).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    IterationBudgetExhausted,
    Converged,
    TreeExhausted,
    /// The run's `Cancel` handle was set before or during the loop (spec
    /// §5); not one of spec §4.7's three named conditions, but the
    /// cooperative-cancellation contract every capability call honors
    /// has to surface somewhere in the outcome.
    Cancelled,
}

/// One iteration's outcome: which node was selected/expanded/simulated,
/// and the reward that got backpropagated (spec §4.7, used by the event
/// log in `crate::session`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub selected: NodeId,
    pub reward: f64,
}

/// The outcome of a full `MCTSEngine::run` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub iterations: Vec<IterationRecord>,
    pub termination: TerminationReason,
    pub best_node: Option<NodeId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn termination_reasons_are_distinct() {
        assert_ne!(TerminationReason::Converged, TerminationReason::TreeExhausted);
    }
}
