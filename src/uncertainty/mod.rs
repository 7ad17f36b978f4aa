//! UncertaintyEvaluator (C8): scores a ToT node's epistemic uncertainty
//! and proposes (without executing) follow-up information-gathering
//! actions (spec §4.8). Grounded on rlm-core's `epistemic` module's
//! claim/grounding-status scoring shape, narrowed from a full
//! hallucination-audit pipeline to the four-component weighted sum the
//! Session's `enable_uncertainty_evaluator` flag gates.

#[cfg(test)]
mod proptest;
mod types;

pub use types::{InfoAction, InfoActionKind, UncertaintyReport};

use crate::config::UncertaintyWeights;
use crate::error::Result;
use crate::fact_store::{ConflictStatus, FactStore};
use crate::tot::ToTNode;

/// Triples below this confidence are treated as under-evidenced and
/// surface a `fetch-more-evidence-for-subject` proposal.
const LOW_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Scores a node's uncertainty from the facts it has extracted so far,
/// without calling any capability (spec §4.8: entirely synchronous except
/// for the `FactStore` persistence reads it needs to gather conflicts and
/// confidence values).
pub struct UncertaintyEvaluator {
    weights: UncertaintyWeights,
}

impl UncertaintyEvaluator {
    pub fn new(weights: UncertaintyWeights) -> Self {
        Self { weights }
    }

    /// Weighted, intentionally-unnormalized sum of four components (spec
    /// §4.8): conflict count, confidence variance, coverage gap
    /// (`1 - coverage`), and axiom gap (`1 - mean step axiom-compliance`).
    pub async fn evaluate(&self, store: &FactStore, node: &ToTNode) -> Result<UncertaintyReport> {
        let mut confidences = Vec::with_capacity(node.spo_fingerprints.len());
        let mut subjects_by_confidence = Vec::new();
        let mut conflicts = Vec::new();
        let mut seen_conflicts = std::collections::HashSet::new();

        for fingerprint in &node.spo_fingerprints {
            if let Some(triple) = store.get(fingerprint).await? {
                confidences.push(triple.confidence);
                if triple.confidence < LOW_CONFIDENCE_THRESHOLD {
                    subjects_by_confidence.push(triple.subject.clone());
                }
            }
            for conflict in store.conflicts_touching(fingerprint).await? {
                if seen_conflicts.insert(conflict.id) {
                    conflicts.push(conflict);
                }
            }
        }

        let conflict_count = conflicts.len() as f64;
        let confidence_variance = variance(&confidences);
        let coverage_gap = 1.0 - node.coverage;
        let axiom_gap = 1.0 - node.axiom_alignment;

        let score = self.weights.conflicts * conflict_count
            + self.weights.confidence_variance * confidence_variance
            + self.weights.coverage_gap * coverage_gap
            + self.weights.axiom_gap * axiom_gap;

        let mut proposed_actions = Vec::new();
        for conflict in &conflicts {
            if matches!(conflict.status, ConflictStatus::Unresolved | ConflictStatus::AwaitingArbitration) {
                proposed_actions.push(InfoAction::request_user_arbitration(conflict.id.to_string()));
            }
        }
        subjects_by_confidence.sort();
        subjects_by_confidence.dedup();
        for subject in &subjects_by_confidence {
            proposed_actions.push(InfoAction::fetch_more_evidence(subject.clone()));
        }
        if node.spo_fingerprints.is_empty() {
            proposed_actions.push(InfoAction::fetch_more_evidence(node.question.clone()));
        }

        Ok(UncertaintyReport {
            score,
            conflict_count,
            confidence_variance,
            coverage_gap,
            axiom_gap,
            proposed_actions,
        })
    }
}

/// Population variance (spec §4.8: "variance of confidence values"). Zero
/// for fewer than two samples — there is no spread to measure.
fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact_store::InMemoryFactPersistence;
    use std::sync::Arc;

    fn store() -> FactStore {
        FactStore::new(Arc::new(InMemoryFactPersistence::new()))
    }

    fn node_with(spo_fingerprints: Vec<crate::fact_store::TripleFingerprint>, coverage: f64, axiom_alignment: f64) -> ToTNode {
        let mut node = ToTNode::root("does solar pay for itself?");
        node.spo_fingerprints = spo_fingerprints;
        node.coverage = coverage;
        node.axiom_alignment = axiom_alignment;
        node
    }

    #[test]
    fn population_variance_of_identical_values_is_zero() {
        assert_eq!(variance(&[0.5, 0.5, 0.5]), 0.0);
    }

    #[test]
    fn single_value_has_no_variance() {
        assert_eq!(variance(&[0.7]), 0.0);
    }

    #[tokio::test]
    async fn scaling_every_weight_by_k_scales_the_score_by_k() {
        let store = store();
        let fp = store.insert("SolarKit", "Cost", "15000 EUR", "calc", 0.3).await.unwrap();
        let node = node_with(vec![fp], 0.5, 0.6);

        let base_weights = UncertaintyWeights {
            conflicts: 0.3,
            confidence_variance: 0.4,
            coverage_gap: 0.2,
            axiom_gap: 0.3,
        };
        let scaled_weights = UncertaintyWeights {
            conflicts: 0.6,
            confidence_variance: 0.8,
            coverage_gap: 0.4,
            axiom_gap: 0.6,
        };

        let base = UncertaintyEvaluator::new(base_weights).evaluate(&store, &node).await.unwrap();
        let scaled = UncertaintyEvaluator::new(scaled_weights).evaluate(&store, &node).await.unwrap();
        assert!((scaled.score - 2.0 * base.score).abs() < 1e-9);
    }

    #[tokio::test]
    async fn low_confidence_triple_proposes_fetch_more_evidence() {
        let store = store();
        let fp = store.insert("SolarKit", "Cost", "15000 EUR", "calc", 0.2).await.unwrap();
        let node = node_with(vec![fp], 1.0, 1.0);
        let report = UncertaintyEvaluator::new(UncertaintyWeights::default())
            .evaluate(&store, &node)
            .await
            .unwrap();
        assert!(report
            .proposed_actions
            .iter()
            .any(|a| a.kind == InfoActionKind::FetchMoreEvidence && a.target == "solar kit"));
    }

    #[tokio::test]
    async fn no_extracted_facts_proposes_fetching_evidence_for_the_question() {
        let store = store();
        let node = node_with(vec![], 0.0, 0.0);
        let report = UncertaintyEvaluator::new(UncertaintyWeights::default())
            .evaluate(&store, &node)
            .await
            .unwrap();
        assert!(report
            .proposed_actions
            .iter()
            .any(|a| a.target == "does solar pay for itself?"));
    }
}
