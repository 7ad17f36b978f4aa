//! AxiomLibrary: loads axioms and freezes them into a session-scoped
//! immutable snapshot (spec §3, §9: "Axioms are session-scoped immutable
//! snapshots; mutating axioms mid-session is forbidden and must produce
//! Fatal").

use std::sync::Arc;

use crate::axiom::types::Axiom;
use crate::error::{Error, Result};

/// An immutable, `Arc`-shared snapshot of the axioms active for a
/// session. Cloning is cheap (one `Arc` bump); there is deliberately no
/// mutation API — attempting to load a second library into an existing
/// session is the caller's responsibility to refuse.
#[derive(Clone)]
pub struct AxiomLibrary {
    axioms: Arc<[Axiom]>,
}

impl AxiomLibrary {
    /// Load a (possibly empty) set of axioms and freeze them. Fails only
    /// if the set contains a malformed axiom (weight/penalty out of the
    /// declared range is clamped at construction in `Axiom::new`, so the
    /// only failure here is a duplicate label, which would make axiom
    /// provenance in the event log ambiguous).
    pub fn load(axioms: Vec<Axiom>) -> Result<Self> {
        let mut labels = std::collections::HashSet::new();
        for axiom in &axioms {
            if !labels.insert(axiom.label.clone()) {
                return Err(Error::invalid_input(format!(
                    "duplicate axiom label: {}",
                    axiom.label
                )));
            }
        }
        Ok(Self {
            axioms: axioms.into(),
        })
    }

    pub fn empty() -> Self {
        Self { axioms: Arc::from(Vec::new()) }
    }

    pub fn axioms(&self) -> &[Axiom] {
        &self.axioms
    }

    pub fn len(&self) -> usize {
        self.axioms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axioms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axiom::types::Axiom;

    #[test]
    fn rejects_duplicate_axiom_labels() {
        let axioms = vec![
            Axiom::new("roi", "financial", 1.0, 5.0, "roi under 10 years"),
            Axiom::new("roi", "financial", 0.5, 2.0, "duplicate label"),
        ];
        assert!(AxiomLibrary::load(axioms).is_err());
    }

    #[test]
    fn snapshot_is_cheaply_cloneable() {
        let axioms = vec![Axiom::new("roi", "financial", 1.0, 5.0, "roi under 10 years")];
        let library = AxiomLibrary::load(axioms).unwrap();
        let clone = library.clone();
        assert_eq!(clone.len(), 1);
    }
}
