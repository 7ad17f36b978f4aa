//! MCTSEngine (C7): augmented-UCB1 selection, expansion delegation to
//! [`crate::tot::ToTManager`], simulation reward composition, and
//! backpropagation over the reasoning tree (spec §4.7). Grounded on the
//! teacher's `reasoning::query`/`reasoning::trace` tree-walking style
//! (BFS/DFS over `DecisionNode` parent/child links via an index, rather
//! than a node owning `Vec<Child>` directly), generalized from Deciduous
//! trace querying to an active search loop that mutates the tree it walks.

mod types;

pub use types::{IterationRecord, SearchOutcome, TerminationReason};

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::capability::{Cancel, LanguageModel};
use crate::config::SessionConfig;
use crate::error::Result;
use crate::fact_store::FactStore;
use crate::tot::{node_fact_quality, ExpansionOutcome, NodeId, NodeStatus, ToTManager, ToTNode};

/// Runs MCTS search rooted at a single node until one of the three
/// termination conditions fires (spec §4.7).
pub struct MCTSEngine<'a> {
    manager: &'a ToTManager,
    model: &'a dyn LanguageModel,
    config: &'a SessionConfig,
}

impl<'a> MCTSEngine<'a> {
    pub fn new(manager: &'a ToTManager, model: &'a dyn LanguageModel, config: &'a SessionConfig) -> Self {
        Self { manager, model, config }
    }

    /// Run until termination, respecting `cancel` and the session's
    /// optional time budget (`mcts_time_budget_ms == 0` means unbounded).
    /// A full iteration — selection, expansion, simulation, backpropagation
    /// — always completes before a deadline or cancellation is honored, so
    /// backpropagation itself is never interrupted (spec §5).
    pub async fn run(&self, root: NodeId, cancel: &Cancel) -> Result<SearchOutcome> {
        let started = std::time::Instant::now();
        let mut iterations = Vec::new();
        let mut convergence_streak = 0u32;

        for iteration in 0..self.config.mcts_iteration_budget {
            if cancel.is_cancelled() {
                info!(iteration, "mcts run cancelled");
                return Ok(self.finish(iterations, TerminationReason::Cancelled, root).await);
            }
            if self.config.mcts_time_budget_ms > 0
                && started.elapsed().as_millis() as u64 >= self.config.mcts_time_budget_ms
            {
                info!(iteration, "mcts time budget exhausted");
                return Ok(self.finish(iterations, TerminationReason::IterationBudgetExhausted, root).await);
            }

            let path = self.select(root).await?;
            let target = *path.last().expect("selection path always has at least root");

            let node = self
                .manager
                .get(target)
                .await
                .ok_or_else(|| crate::error::Error::invalid_input(format!("node {target} vanished")))?;

            if node.status == NodeStatus::Created {
                match self.manager.expand(target, self.model, self.config, cancel).await? {
                    ExpansionOutcome::Cancelled => {
                        return Ok(self.finish(iterations, TerminationReason::Cancelled, root).await);
                    }
                    ExpansionOutcome::Expanded { .. } | ExpansionOutcome::Terminal => {}
                }
            }

            let node = self.manager.get(target).await.unwrap();
            let reward = self.simulate(&node).await?;
            self.backpropagate(&path, reward).await;

            iterations.push(IterationRecord { selected: target, reward });

            let best_path_reward = self.best_child_mean_reward(root).await;
            if best_path_reward >= self.config.convergence_threshold {
                convergence_streak += 1;
            } else {
                convergence_streak = 0;
            }
            debug!(iteration, reward, best_path_reward, convergence_streak, "mcts iteration complete");

            if convergence_streak >= self.config.convergence_streak {
                return Ok(self.finish(iterations, TerminationReason::Converged, root).await);
            }
            if self.all_leaves_terminal_or_pruned(root).await {
                return Ok(self.finish(iterations, TerminationReason::TreeExhausted, root).await);
            }
        }

        Ok(self.finish(iterations, TerminationReason::IterationBudgetExhausted, root).await)
    }

    async fn finish(&self, iterations: Vec<IterationRecord>, termination: TerminationReason, root: NodeId) -> SearchOutcome {
        let best_node = self.best_node(root).await;
        SearchOutcome { iterations, termination, best_node }
    }

    /// Walk from `root`, stopping at the first node that is itself
    /// `created` (the expansion target) or has no selectable children
    /// (spec §4.7 step 1: "stop descending when the current node is not
    /// fully expanded"). A node with any `created` child is, by
    /// definition, not fully expanded — its unvisited children carry
    /// infinite UCB and are chosen before any visited sibling, so the
    /// descent naturally halts there.
    async fn select(&self, root: NodeId) -> Result<Vec<NodeId>> {
        let mut path = vec![root];
        let mut current = root;
        loop {
            let node = self
                .manager
                .get(current)
                .await
                .ok_or_else(|| crate::error::Error::invalid_input(format!("node {current} vanished")))?;
            if node.status == NodeStatus::Created {
                break;
            }
            let children: Vec<NodeId> = self.manager.children_of(current).await;
            let mut selectable = Vec::with_capacity(children.len());
            for child in children {
                if let Some(n) = self.manager.get(child).await {
                    if n.status != NodeStatus::Pruned {
                        selectable.push(child);
                    }
                }
            }
            if selectable.is_empty() {
                break;
            }
            let chosen = self.select_child(current, &selectable).await?;
            path.push(chosen);
            if self.manager.get(chosen).await.map(|n| n.status) == Some(NodeStatus::Created) {
                break;
            }
            current = chosen;
        }
        Ok(path)
    }

    /// Augmented UCB1 over `candidates` (spec §4.7): `Q/N + c·√(ln
    /// N(parent)/N(n)) + β_cov·(1−coverage(n)) + β_prior·prior(n)`.
    /// Unvisited children (`N(n)=0`) score `+infinity` and are chosen
    /// ahead of any visited sibling, in insertion order among themselves.
    async fn select_child(&self, parent: NodeId, candidates: &[NodeId]) -> Result<NodeId> {
        self.manager.refresh_coverage(parent).await?;
        let parent_visits = self.manager.get(parent).await.map(|n| n.visits).unwrap_or(0).max(1);

        let mut best: Option<(usize, NodeId, f64)> = None;
        for (index, &candidate) in candidates.iter().enumerate() {
            let node = self
                .manager
                .get(candidate)
                .await
                .ok_or_else(|| crate::error::Error::invalid_input(format!("node {candidate} vanished")))?;
            let score = self.augmented_ucb1(&node, parent_visits);
            let better = match &best {
                None => true,
                Some((_, _, best_score)) => score > *best_score,
            };
            if better {
                best = Some((index, candidate, score));
            }
        }
        Ok(best.expect("candidates is non-empty").1)
    }

    fn augmented_ucb1(&self, node: &ToTNode, parent_visits: u64) -> f64 {
        if node.visits == 0 {
            return f64::INFINITY;
        }
        let exploitation = node.mean_reward();
        let exploration = self.config.exploration_constant
            * ((parent_visits as f64).ln() / node.visits as f64).sqrt();
        let coverage_bonus = self.config.coverage_weight * (1.0 - node.coverage);
        let prior_bonus = self.config.prior_weight * node.prior;
        exploitation + exploration + coverage_bonus + prior_bonus
    }

    /// Composite reward for a just-(or previously-)expanded node (spec
    /// §4.7 step 3): 0.5·variant score + 0.3·axiom-conclusion +
    /// 0.2·tier-weighted fact quality (weights from
    /// `config.reward_weights`), minus 0.5 on a flagged violation, clipped
    /// to `[-1,1]`.
    async fn simulate(&self, node: &ToTNode) -> Result<f64> {
        let variant = node.selected_variant();
        let variant_score = variant.map(|v| v.aggregate_score()).unwrap_or(0.0);
        let violation = variant.map(|v| v.has_violation()).unwrap_or(false);
        let fact_quality = node_fact_quality(self.store(), node).await?;

        let weights = self.config.reward_weights;
        let mut reward = weights.variant_score * variant_score
            + weights.axiom_conclusion * node.axiom_alignment
            + weights.fact_quality * fact_quality;
        if violation {
            reward -= 0.5;
        }
        Ok(reward.clamp(-1.0, 1.0))
    }

    /// Increment `N` by 1 and add `reward` to `Q` at every node on `path`,
    /// root included (spec §4.7 step 4).
    async fn backpropagate(&self, path: &[NodeId], reward: f64) {
        for &node_id in path {
            self.manager.record_visit(node_id, reward).await;
        }
    }

    async fn best_child_mean_reward(&self, root: NodeId) -> f64 {
        let children = self.manager.children_of(root).await;
        let mut best = 0.0;
        for child in children {
            if let Some(n) = self.manager.get(child).await {
                if n.visits > 0 {
                    best = f64::max(best, n.mean_reward());
                }
            }
        }
        best
    }

    /// BFS over the whole tree; true once every leaf (node with no
    /// children) is `terminal` or `pruned` (spec §4.7 termination).
    async fn all_leaves_terminal_or_pruned(&self, root: NodeId) -> bool {
        let mut queue = VecDeque::from([root]);
        while let Some(current) = queue.pop_front() {
            let children = self.manager.children_of(current).await;
            if children.is_empty() {
                let Some(node) = self.manager.get(current).await else { continue };
                if !matches!(node.status, NodeStatus::Terminal | NodeStatus::Pruned) {
                    return false;
                }
            } else {
                queue.extend(children);
            }
        }
        true
    }

    /// The visited node (including root) with the highest mean reward,
    /// ties broken by earliest-visited in a root-first BFS.
    async fn best_node(&self, root: NodeId) -> Option<NodeId> {
        let mut queue = VecDeque::from([root]);
        let mut best: Option<(NodeId, f64)> = None;
        while let Some(current) = queue.pop_front() {
            if let Some(node) = self.manager.get(current).await {
                if node.visits > 0 {
                    let reward = node.mean_reward();
                    let replace = match &best {
                        None => true,
                        Some((_, best_reward)) => reward > *best_reward,
                    };
                    if replace {
                        best = Some((current, reward));
                    }
                }
            }
            queue.extend(self.manager.children_of(current).await);
        }
        best.map(|(id, _)| id)
    }

    fn store(&self) -> &FactStore {
        self.manager.store()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axiom::AxiomLibrary;
    use crate::capability::language_model::fakes::ScriptedLanguageModel;
    use crate::fact_store::InMemoryFactPersistence;
    use std::sync::Arc;

    fn manager() -> ToTManager {
        let store = Arc::new(FactStore::new(Arc::new(InMemoryFactPersistence::new())));
        ToTManager::new(store, AxiomLibrary::empty())
    }

    #[tokio::test]
    async fn a_single_iteration_expands_the_root_and_backpropagates() {
        let manager = manager();
        let root = manager.insert_root("evaluate solar ROI").await;
        let model = ScriptedLanguageModel::new();
        let mut config = SessionConfig::default();
        config.mcts_iteration_budget = 1;
        let engine = MCTSEngine::new(&manager, &model, &config);
        let outcome = engine.run(root, &Cancel::new()).await.unwrap();
        assert_eq!(outcome.iterations.len(), 1);
        let node = manager.get(root).await.unwrap();
        assert_eq!(node.visits, 1);
    }

    #[tokio::test]
    async fn budget_exhaustion_terminates_after_the_configured_count() {
        let manager = manager();
        let root = manager.insert_root("q").await;
        let model = ScriptedLanguageModel::new();
        let mut config = SessionConfig::default();
        config.mcts_iteration_budget = 5;
        config.max_depth = 1; // root expands straight to terminal, nothing left to explore
        let engine = MCTSEngine::new(&manager, &model, &config);
        let outcome = engine.run(root, &Cancel::new()).await.unwrap();
        assert!(matches!(
            outcome.termination,
            TerminationReason::TreeExhausted | TerminationReason::IterationBudgetExhausted
        ));
    }

    #[tokio::test]
    async fn cancellation_is_observed_before_the_next_iteration() {
        let manager = manager();
        let root = manager.insert_root("q").await;
        let model = ScriptedLanguageModel::new();
        let config = SessionConfig::default();
        let cancel = Cancel::new();
        cancel.cancel();
        let engine = MCTSEngine::new(&manager, &model, &config);
        let outcome = engine.run(root, &cancel).await.unwrap();
        assert_eq!(outcome.termination, TerminationReason::Cancelled);
        assert!(outcome.iterations.is_empty());
    }

    #[tokio::test]
    async fn backpropagation_increments_every_node_on_the_path() {
        let manager = manager();
        let root = manager.insert_root("q").await;
        let model = ScriptedLanguageModel::new();
        let mut config = SessionConfig::default();
        config.mcts_iteration_budget = 3;
        let engine = MCTSEngine::new(&manager, &model, &config);
        engine.run(root, &Cancel::new()).await.unwrap();
        let node = manager.get(root).await.unwrap();
        assert!(node.visits >= 1);
    }
}
