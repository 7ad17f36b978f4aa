//! SPO triple and conflict-record types (spec §3).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Confidence class. Ordered Bronze < Silver < Gold so that
/// `new_tier >= old_tier` expresses the tier-monotonicity invariant
/// (spec §3 invariant ii) directly as a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Tier {
    Bronze = 0,
    Silver = 1,
    Gold = 2,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Bronze => write!(f, "bronze"),
            Tier::Silver => write!(f, "silver"),
            Tier::Gold => write!(f, "gold"),
        }
    }
}

/// Content hash over (normalized subject, predicate, object, primary
/// source) — the single identity a triple carries (spec §3, §6). Derived,
/// never randomly generated, so two ingests of the same normalized fact
/// collide to the same fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TripleFingerprint([u8; 32]);

impl TripleFingerprint {
    pub fn compute(subject: &str, predicate: &str, object: &str, primary_source: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(subject.as_bytes());
        hasher.update(b"\0");
        hasher.update(predicate.as_bytes());
        hasher.update(b"\0");
        hasher.update(object.as_bytes());
        hasher.update(b"\0");
        hasher.update(primary_source.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Reconstruct a fingerprint from its raw bytes, used only when
    /// round-tripping a previously computed fingerprint through storage.
    /// Never use this to fabricate a fingerprint from scratch — always go
    /// through `compute`.
    pub(crate) fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for TripleFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// An object value: a bare literal, or a number with an explicit unit.
/// Bare numerics without a unit are rejected at ingest (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectValue {
    Literal(String),
    Numeric { value: f64, unit: String },
}

impl fmt::Display for ObjectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectValue::Literal(s) => write!(f, "{s}"),
            ObjectValue::Numeric { value, unit } => write!(f, "{value} {unit}"),
        }
    }
}

/// The atomic fact (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpoTriple {
    pub fingerprint: TripleFingerprint,
    pub subject: String,
    pub predicate: String,
    pub object: ObjectValue,
    pub provenance: Vec<String>,
    pub confidence: f64,
    pub tier: Tier,
    pub created_at: DateTime<Utc>,
    pub superseded_by: Option<TripleFingerprint>,
}

impl SpoTriple {
    pub fn primary_source(&self) -> Option<&str> {
        self.provenance.first().map(|s| s.as_str())
    }

    pub fn is_superseded(&self) -> bool {
        self.superseded_by.is_some()
    }

    /// Number of distinct primary sources that have contributed to this
    /// triple, used by the Bronze→Silver promotion rule (spec §4.3).
    pub fn independent_source_count(&self) -> usize {
        self.provenance
            .iter()
            .collect::<std::collections::HashSet<_>>()
            .len()
    }
}

/// Kind of incompatibility between two triples sharing a (subject,
/// predicate) pair (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    NumericalMismatch,
    Antonym,
    CategoricalDisagreement,
}

/// Status of a conflict record on the escalation ladder (spec §4.3, §9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConflictStatus {
    Unresolved,
    AutoMerged { merged_into: TripleFingerprint },
    AuthorityResolved { authority_source: String },
    AwaitingArbitration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConflictId(Uuid);

impl ConflictId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConflictId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub id: ConflictId,
    pub a: TripleFingerprint,
    pub b: TripleFingerprint,
    pub kind: ConflictKind,
    pub status: ConflictStatus,
    pub created_at: DateTime<Utc>,
}

/// Filter used by `FactStore::query` (spec §4.1).
#[derive(Debug, Clone, Default)]
pub struct TripleQuery {
    pub subject: Option<String>,
    pub predicate: Option<String>,
    pub object: Option<String>,
    pub min_tier: Option<Tier>,
    pub min_confidence: Option<f64>,
    pub include_superseded: bool,
}

/// Per-tier counts returned by `stats_by_tier` (spec §4.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TierStats {
    pub bronze: u64,
    pub silver: u64,
    pub gold: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let a = TripleFingerprint::compute("solarkit", "cost", "15000 eur", "calc");
        let b = TripleFingerprint::compute("solarkit", "cost", "15000 eur", "calc");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_on_any_component() {
        let a = TripleFingerprint::compute("solarkit", "cost", "15000 eur", "calc");
        let b = TripleFingerprint::compute("solarkit", "cost", "15001 eur", "calc");
        assert_ne!(a, b);
    }

    #[test]
    fn tier_ordering_is_monotonic_by_declaration_order() {
        assert!(Tier::Bronze < Tier::Silver);
        assert!(Tier::Silver < Tier::Gold);
    }
}
