//! Uncertainty report and information-gathering proposal types (spec
//! §4.8).

use serde::{Deserialize, Serialize};

/// The kind of follow-up `UncertaintyEvaluator` proposes. The core never
/// executes these — it only names them (spec §4.8: "without execution").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfoActionKind {
    FetchMoreEvidence,
    RequestUserArbitration,
}

/// A single proposed follow-up, e.g. `fetch-more-evidence-for-subject(X)`
/// or `request-user-arbitration(conflict-id)` (spec §4.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoAction {
    pub kind: InfoActionKind,
    pub target: String,
}

impl InfoAction {
    pub fn fetch_more_evidence(subject: impl Into<String>) -> Self {
        Self {
            kind: InfoActionKind::FetchMoreEvidence,
            target: subject.into(),
        }
    }

    pub fn request_user_arbitration(conflict_id: impl Into<String>) -> Self {
        Self {
            kind: InfoActionKind::RequestUserArbitration,
            target: conflict_id.into(),
        }
    }
}

impl std::fmt::Display for InfoAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            InfoActionKind::FetchMoreEvidence => write!(f, "fetch-more-evidence-for-subject({})", self.target),
            InfoActionKind::RequestUserArbitration => write!(f, "request-user-arbitration({})", self.target),
        }
    }
}

/// The per-node uncertainty score plus its four components and any
/// proposed follow-ups (spec §4.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyReport {
    pub score: f64,
    pub conflict_count: f64,
    pub confidence_variance: f64,
    pub coverage_gap: f64,
    pub axiom_gap: f64,
    pub proposed_actions: Vec<InfoAction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_the_named_action_grammar() {
        let action = InfoAction::fetch_more_evidence("SolarKit");
        assert_eq!(action.to_string(), "fetch-more-evidence-for-subject(SolarKit)");
    }
}
