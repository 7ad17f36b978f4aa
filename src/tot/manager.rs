//! ToTManager (C6): owns the reasoning tree and is the only component
//! allowed to mutate it (spec §4.6). Grounded on rlm-core's
//! `reasoning::types::DecisionNode` / `reasoning::trace::ReasoningTrace`
//! ownership style — nodes own their content, a central store owns the
//! graph — generalized from the Deciduous goal/decision/option taxonomy to
//! ToT's `created/expanding/expanded/pruned/terminal` node lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::axiom::{AxiomJudge, AxiomLibrary, JudgeInput};
use crate::capability::{Cancel, LanguageModel};
use crate::config::SessionConfig;
use crate::cot::{CotGenerator, CotVariant, DEFAULT_APPROACHES};
use crate::error::{Error, Result};
use crate::fact_store::{FactStore, ObjectValue, Tier};
use crate::tot::parse::parse_variant_text;
use crate::tot::types::{NodeId, NodeStatus, ToTEdge, ToTNode};
use crate::verify;

/// Outcome of a single expansion attempt (spec §4.6 steps 1–8).
#[derive(Debug, Clone)]
pub enum ExpansionOutcome {
    /// The node reached `expanded` with `children` newly created in
    /// `created` state (possibly empty if the decomposition heuristic
    /// produced none).
    Expanded { children: Vec<NodeId> },
    /// The node reached `terminal` directly: max depth, or the winning
    /// variant's axiom alignment crossed the terminal threshold with no
    /// further decomposition (spec §4.6).
    Terminal,
    /// The expansion was cancelled after variant generation but before SPO
    /// insertion; the node was rolled back to `created` and no triples were
    /// attributed to it (spec §5, §8 scenario 6).
    Cancelled,
}

/// Owns `ToTNode`/`ToTEdge` storage, the per-node expansion lock, and the
/// expansion algorithm of spec §4.6. Shared across the coordinator task and
/// (read-only) inspection callers via `Arc`.
pub struct ToTManager {
    store: Arc<FactStore>,
    library: AxiomLibrary,
    nodes: AsyncMutex<HashMap<NodeId, ToTNode>>,
    edges: AsyncMutex<Vec<ToTEdge>>,
    /// One lock per node, guarding `created → expanding` (spec §5: "only
    /// one expansion is in progress on a given node at a time, enforced by
    /// a per-node expansion lock").
    locks: AsyncMutex<HashMap<NodeId, Arc<AsyncMutex<()>>>>,
}

impl ToTManager {
    pub fn new(store: Arc<FactStore>, library: AxiomLibrary) -> Self {
        Self {
            store,
            library,
            nodes: AsyncMutex::new(HashMap::new()),
            edges: AsyncMutex::new(Vec::new()),
            locks: AsyncMutex::new(HashMap::new()),
        }
    }

    /// Insert the session's root node and return its id.
    pub async fn insert_root(&self, question: impl Into<String>) -> NodeId {
        let node = ToTNode::root(question);
        let id = node.id;
        self.nodes.lock().await.insert(id, node);
        id
    }

    pub async fn get(&self, id: NodeId) -> Option<ToTNode> {
        self.nodes.lock().await.get(&id).cloned()
    }

    pub async fn children_of(&self, parent: NodeId) -> Vec<NodeId> {
        self.edges
            .lock()
            .await
            .iter()
            .filter(|e| e.parent == parent)
            .map(|e| e.child)
            .collect()
    }

    /// All nodes currently in the tree, in arbitrary order. Used by session
    /// snapshotting, which imposes its own parent-before-child ordering.
    pub async fn all_nodes(&self) -> Vec<ToTNode> {
        self.nodes.lock().await.values().cloned().collect()
    }

    /// All parent-child edges currently in the tree.
    pub async fn all_edges(&self) -> Vec<ToTEdge> {
        self.edges.lock().await.clone()
    }

    async fn lock_for(&self, id: NodeId) -> Arc<AsyncMutex<()>> {
        self.locks
            .lock()
            .await
            .entry(id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    async fn set_status(&self, id: NodeId, status: NodeStatus) {
        if let Some(node) = self.nodes.lock().await.get_mut(&id) {
            node.status = status;
        }
    }

    /// Run the full expansion algorithm for `node_id` (spec §4.6 steps
    /// 1–8). Returns `Error::Contention` if another task already holds the
    /// node's expansion lock — the caller (MCTS selection) re-selects.
    pub async fn expand(
        &self,
        node_id: NodeId,
        model: &dyn LanguageModel,
        config: &SessionConfig,
        cancel: &Cancel,
    ) -> Result<ExpansionOutcome> {
        let lock = self.lock_for(node_id).await;
        let _guard = lock
            .try_lock()
            .map_err(|_| Error::contention(node_id.to_string()))?;

        let node = self
            .get(node_id)
            .await
            .ok_or_else(|| Error::invalid_input(format!("no such node: {node_id}")))?;
        if node.status != NodeStatus::Created {
            return Err(Error::invalid_input(format!(
                "node {node_id} is not in created state (got {:?})",
                node.status
            )));
        }

        // Step 1: created -> expanding.
        self.set_status(node_id, NodeStatus::Expanding).await;

        // Step 2: invoke CoTGenerator for N variants.
        let generator = CotGenerator::new(&self.library, config.prm_weights);
        let batch = generator
            .generate(
                &node.question,
                DEFAULT_APPROACHES,
                &config.variant_temperatures,
                model,
                config.judge_temperature,
            )
            .await?;

        if cancel.is_cancelled() {
            self.set_status(node_id, NodeStatus::Created).await;
            info!(%node_id, "expansion cancelled before SPO insertion, node rolled back");
            return Ok(ExpansionOutcome::Cancelled);
        }

        // Step 3: select the winning variant deterministically.
        let winner_index = {
            let winner = batch
                .select_best(DEFAULT_APPROACHES)
                .expect("variant_count >= 1 guarantees at least one variant");
            batch
                .variants
                .iter()
                .position(|v| std::ptr::eq(v, winner))
                .expect("select_best returns a reference into batch.variants")
        };
        let winner = batch.variants[winner_index].clone();

        // Step 4: parse the winning variant into SPO candidates, rejecting
        // pronoun subjects / missing units / verdict-laden objects.
        let mut accepted = Vec::new();
        for step in &winner.steps {
            let outcome = parse_variant_text(&step.text);
            for rejected in &outcome.rejected {
                warn!(%node_id, reason = %rejected.1, "rejected SPO candidate during extraction");
            }
            accepted.extend(outcome.accepted);
        }

        // Step 5: insert accepted triples, attributing this node as source,
        // then trigger the promotion pipeline.
        let source = node_id.to_string();
        let mut fingerprints = Vec::with_capacity(accepted.len());
        for candidate in &accepted {
            match self
                .store
                .insert(&candidate.subject, &candidate.predicate, &candidate.object, &source, 0.5)
                .await
            {
                Ok(fp) => fingerprints.push(fp),
                Err(err) => warn!(%node_id, error = %err, "insert failed for extracted triple"),
            }
        }
        verify::run_promotion_pipeline(
            &self.store,
            &self.library,
            model,
            config.judge_temperature,
            &config.tier_thresholds,
            None,
            0.0,
            &fingerprints,
        )
        .await?;

        // Step 6: recompute axiom alignment over the winning variant's
        // steps (mean of the PRM's already-computed, normalized axiom
        // components — the same [0,1] scale the Judge aggregate maps to).
        let axiom_alignment = mean_axiom_alignment(&winner);

        // Step 7: decomposition heuristic, bounded by branching_factor.
        let depth = node.depth + 1;
        let mut children = Vec::new();
        if depth < config.max_depth {
            let candidate_subjects = distinct_subjects(&accepted, config.branching_factor as usize);
            let mut nodes = self.nodes.lock().await;
            let mut edges = self.edges.lock().await;
            for subject in candidate_subjects {
                let question = format!("{} — explore {subject} further", node.question);
                let child = ToTNode::child(node_id, depth, question);
                let child_id = child.id;
                edges.push(ToTEdge {
                    parent: node_id,
                    child: child_id,
                    label: subject,
                });
                nodes.insert(child_id, child);
                children.push(child_id);
            }
        }

        // Step 8 / terminal check: depth == max, or axiom alignment crosses
        // the terminal threshold with no new sub-questions produced.
        let reached_terminal = depth >= config.max_depth
            || (axiom_alignment >= config.terminal_axiom_alignment_threshold && children.is_empty());

        {
            let mut nodes = self.nodes.lock().await;
            let stored = nodes
                .get_mut(&node_id)
                .ok_or_else(|| Error::invalid_input(format!("node {node_id} vanished mid-expansion")))?;
            stored.variants = batch.variants;
            stored.selected_variant = Some(winner_index);
            stored.spo_fingerprints = fingerprints;
            stored.axiom_alignment = axiom_alignment;
            stored.status = if reached_terminal {
                NodeStatus::Terminal
            } else {
                NodeStatus::Expanded
            };
        }

        debug!(%node_id, axiom_alignment, children = children.len(), "node expanded");

        if reached_terminal {
            Ok(ExpansionOutcome::Terminal)
        } else {
            Ok(ExpansionOutcome::Expanded { children })
        }
    }

    /// `expanded -> pruned`: invoked by MCTS when the node's UCB value plus
    /// bonuses falls below the pruning floor and it has no unexplored
    /// children (spec §4.6).
    pub async fn prune(&self, node_id: NodeId) -> Result<()> {
        let mut nodes = self.nodes.lock().await;
        let node = nodes
            .get_mut(&node_id)
            .ok_or_else(|| Error::invalid_input(format!("no such node: {node_id}")))?;
        if node.status != NodeStatus::Expanded {
            return Err(Error::invalid_input(format!(
                "only expanded nodes may be pruned, node {node_id} is {:?}",
                node.status
            )));
        }
        node.status = NodeStatus::Pruned;
        // Variants are dropped on prune except the selected one, retained
        // for audit (spec §3 "Ownership").
        if let Some(selected) = node.selected_variant {
            let kept = node.variants.get(selected).cloned();
            node.variants = kept.into_iter().collect();
            node.selected_variant = if node.variants.is_empty() { None } else { Some(0) };
        } else {
            node.variants.clear();
        }
        Ok(())
    }

    /// Parent-child coverage accounting (spec §4.6): fraction of `parent`'s
    /// children that are `expanded` or `terminal`.
    pub async fn coverage(&self, parent: NodeId) -> f64 {
        let children = self.children_of(parent).await;
        if children.is_empty() {
            return 1.0;
        }
        let nodes = self.nodes.lock().await;
        let covered = children
            .iter()
            .filter(|id| {
                nodes
                    .get(id)
                    .map(|n| matches!(n.status, NodeStatus::Expanded | NodeStatus::Terminal))
                    .unwrap_or(false)
            })
            .count();
        covered as f64 / children.len() as f64
    }

    /// Recompute and store `coverage` for `parent`, the session-level
    /// progress input the root's coverage feeds (spec §4.6).
    pub async fn refresh_coverage(&self, parent: NodeId) -> Result<()> {
        let coverage = self.coverage(parent).await;
        let mut nodes = self.nodes.lock().await;
        let node = nodes
            .get_mut(&parent)
            .ok_or_else(|| Error::invalid_input(format!("no such node: {parent}")))?;
        node.coverage = coverage;
        Ok(())
    }

    /// Increment a node's visit count and add `reward` to its cumulative
    /// reward — the backpropagation step MCTS drives (spec §4.7 step 4).
    pub async fn record_visit(&self, id: NodeId, reward: f64) {
        if let Some(node) = self.nodes.lock().await.get_mut(&id) {
            node.visits += 1;
            node.cumulative_reward += reward;
        }
    }

    pub fn store(&self) -> &FactStore {
        &self.store
    }

    pub fn library(&self) -> &AxiomLibrary {
        &self.library
    }

    /// Insert `node` verbatim, preserving its id — unlike `insert_root`
    /// and the expansion step's `ToTNode::child`, which always mint a
    /// fresh `NodeId`. Used only by session replay, which reconstructs
    /// tree state from logged snapshots rather than re-running expansion.
    pub async fn restore_node(&self, node: ToTNode) {
        self.nodes.lock().await.insert(node.id, node);
    }

    /// Insert `edge` verbatim. Used only by session replay.
    pub async fn restore_edge(&self, edge: ToTEdge) {
        self.edges.lock().await.push(edge);
    }
}

/// Mean of the selected variant's per-step normalized axiom component
/// (already in [0,1] via `ProcessRewardModel`'s Judge-aggregate mapping).
fn mean_axiom_alignment(variant: &CotVariant) -> f64 {
    if variant.step_scores.is_empty() {
        return 0.0;
    }
    variant.step_scores.iter().map(|s| s.axiom).sum::<f64>() / variant.step_scores.len() as f64
}

/// Up to `limit` distinct accepted-triple subjects, in first-seen order —
/// the decomposition heuristic's child-question source (spec §4.6 step 7:
/// "proposes up to the session's branching factor").
fn distinct_subjects(accepted: &[crate::tot::parse::ParsedTriple], limit: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for triple in accepted {
        if seen.insert(triple.subject.clone()) {
            out.push(triple.subject.clone());
            if out.len() >= limit {
                break;
            }
        }
    }
    out
}

/// Aggregates a node's axiom alignment directly from the fact store's
/// triples — used by `UncertaintyEvaluator` (spec §4.8), which needs the
/// mean step axiom-compliance independent of whether the node is still
/// `expanding`.
pub async fn node_axiom_score(
    store: &FactStore,
    library: &AxiomLibrary,
    model: &dyn LanguageModel,
    judge_temperature: f64,
    node: &ToTNode,
) -> Result<f64> {
    if node.spo_fingerprints.is_empty() {
        return Ok(0.5);
    }
    let judge = AxiomJudge::new(library);
    let mut total = 0.0;
    let mut count = 0usize;
    for fp in &node.spo_fingerprints {
        if let Some(triple) = store.get(fp).await? {
            let mut input = JudgeInput::text_only(format!("{} {} {}", triple.subject, triple.predicate, triple.object));
            if let ObjectValue::Numeric { value, .. } = &triple.object {
                input = input.with_numeric_field(triple.predicate.clone(), *value);
            }
            let score = judge.evaluate(&input, model, judge_temperature).await?;
            total += score.total;
            count += 1;
        }
    }
    if count == 0 {
        Ok(0.5)
    } else {
        Ok(((total / count as f64).clamp(-1.0, 1.0) + 1.0) / 2.0)
    }
}

/// Tier-weighted fact-quality score over a node's extracted SPOs (spec
/// §4.7 simulation reward, Gold=1.0/Silver=0.6/Bronze=0.3).
pub async fn node_fact_quality(store: &FactStore, node: &ToTNode) -> Result<f64> {
    if node.spo_fingerprints.is_empty() {
        return Ok(0.0);
    }
    let mut total = 0.0;
    let mut count = 0usize;
    for fp in &node.spo_fingerprints {
        if let Some(triple) = store.get(fp).await? {
            total += match triple.tier {
                Tier::Gold => 1.0,
                Tier::Silver => 0.6,
                Tier::Bronze => 0.3,
            };
            count += 1;
        }
    }
    if count == 0 {
        Ok(0.0)
    } else {
        Ok(total / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::language_model::fakes::ScriptedLanguageModel;
    use crate::fact_store::InMemoryFactPersistence;

    fn manager() -> ToTManager {
        let store = Arc::new(FactStore::new(Arc::new(InMemoryFactPersistence::new())));
        ToTManager::new(store, AxiomLibrary::empty())
    }

    #[tokio::test]
    async fn root_starts_in_created_state() {
        let manager = manager();
        let id = manager.insert_root("does solar pay for itself?").await;
        let node = manager.get(id).await.unwrap();
        assert_eq!(node.status, NodeStatus::Created);
        assert_eq!(node.depth, 0);
    }

    #[tokio::test]
    async fn expansion_produces_exactly_variant_count_variants() {
        let manager = manager();
        let id = manager.insert_root("evaluate solar ROI").await;
        let model = ScriptedLanguageModel::new();
        let config = SessionConfig::default();
        let outcome = manager.expand(id, &model, &config, &Cancel::new()).await.unwrap();
        let node = manager.get(id).await.unwrap();
        assert_eq!(node.variants.len(), config.variant_count as usize);
        assert!(node.selected_variant.is_some());
        assert!(matches!(outcome, ExpansionOutcome::Expanded { .. } | ExpansionOutcome::Terminal));
    }

    #[tokio::test]
    async fn expansion_rejects_double_expand_while_locked() {
        let manager = Arc::new(manager());
        let id = manager.insert_root("q").await;
        let model = ScriptedLanguageModel::new();
        let config = SessionConfig::default();

        // Hold the lock manually to simulate a concurrent in-flight expansion.
        let lock = manager.lock_for(id).await;
        let _guard = lock.lock().await;
        let err = manager.expand(id, &model, &config, &Cancel::new()).await.unwrap_err();
        assert!(matches!(err, Error::Contention(_)));
    }

    #[tokio::test]
    async fn max_depth_reaches_terminal_directly() {
        let manager = manager();
        let id = manager.insert_root("q").await;
        let model = ScriptedLanguageModel::new();
        let mut config = SessionConfig::default();
        config.max_depth = 1;
        config.variant_temperatures = vec![0.7, 0.8, 0.9];
        manager.expand(id, &model, &config, &Cancel::new()).await.unwrap();
        let node = manager.get(id).await.unwrap();
        assert_eq!(node.status, NodeStatus::Terminal);
    }

    #[tokio::test]
    async fn cancellation_before_insertion_rolls_back_to_created() {
        let manager = manager();
        let id = manager.insert_root("q").await;
        let model = ScriptedLanguageModel::new();
        let config = SessionConfig::default();
        let cancel = Cancel::new();
        cancel.cancel();
        let outcome = manager.expand(id, &model, &config, &cancel).await.unwrap();
        assert!(matches!(outcome, ExpansionOutcome::Cancelled));
        let node = manager.get(id).await.unwrap();
        assert_eq!(node.status, NodeStatus::Created);
        assert!(node.spo_fingerprints.is_empty());
    }

    #[tokio::test]
    async fn coverage_is_full_for_a_leaf_with_no_children() {
        let manager = manager();
        let id = manager.insert_root("q").await;
        assert_eq!(manager.coverage(id).await, 1.0);
    }

    #[tokio::test]
    async fn pruning_requires_expanded_state() {
        let manager = manager();
        let id = manager.insert_root("q").await;
        let err = manager.prune(id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
