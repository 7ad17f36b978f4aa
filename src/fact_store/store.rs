//! `FactStore` (C1): the business-logic layer on top of `FactPersistence` —
//! dedupe/merge, fingerprinting, canonicalization, and deterministic
//! ordering (spec §4.1). Grounded on rlm-core's `SqliteMemoryStore`,
//! which embeds both the storage connection and the domain methods
//! (`promote`, `decay`, `consolidate`, `stats`) in one type; here the
//! storage connection is pulled out behind `FactPersistence` so the same
//! business logic runs over either a real database or an in-memory fake.

use std::sync::Arc;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::fact_store::normalize::{normalize_entity, normalize_object, object_fingerprint_key};
use crate::fact_store::persistence::FactPersistence;
use crate::fact_store::types::{
    ConflictKind, ConflictRecord, ConflictStatus, SpoTriple, Tier, TripleFingerprint, TripleQuery,
    TierStats,
};

/// Persist, deduplicate, and query SPO triples with provenance (spec §4.1).
pub struct FactStore {
    persistence: Arc<dyn FactPersistence>,
}

impl FactStore {
    pub fn new(persistence: Arc<dyn FactPersistence>) -> Self {
        Self { persistence }
    }

    /// Insert a raw (subject, predicate, object) assertion from `source`.
    /// Returns the fingerprint. Fails only if the triple is malformed
    /// (empty field, or an object lacking a required unit) — see spec
    /// §4.1 failure semantics.
    pub async fn insert(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
        source: &str,
        initial_confidence: f64,
    ) -> Result<TripleFingerprint> {
        if subject.trim().is_empty() || predicate.trim().is_empty() || source.trim().is_empty() {
            return Err(Error::invalid_input("subject, predicate, and source must not be empty"));
        }
        let norm_subject = normalize_entity(subject);
        let norm_predicate = normalize_entity(predicate);
        let norm_object = normalize_object(object)?;
        let object_key = object_fingerprint_key(&norm_object);

        // A prior assertion of the identical normalized fact — possibly
        // from a different source — merges into the existing triple
        // rather than minting a second fingerprint for the same content
        // (spec §3 invariant i, §4.1).
        match self
            .persistence
            .find_by_content(&norm_subject, &norm_predicate, &object_key)
            .await?
        {
            Some(mut existing) => {
                let sources_differ = !existing.provenance.iter().any(|s| s == source);
                if sources_differ {
                    existing.provenance.push(source.to_string());
                    existing.confidence = existing.confidence.max(initial_confidence);
                }
                let fingerprint = existing.fingerprint;
                self.persistence.upsert(existing).await?;
                Ok(fingerprint)
            }
            None => {
                let fingerprint =
                    TripleFingerprint::compute(&norm_subject, &norm_predicate, &object_key, source);
                let triple = SpoTriple {
                    fingerprint,
                    subject: norm_subject,
                    predicate: norm_predicate,
                    object: norm_object,
                    provenance: vec![source.to_string()],
                    confidence: initial_confidence,
                    tier: Tier::Bronze,
                    created_at: Utc::now(),
                    superseded_by: None,
                };
                self.persistence.upsert(triple).await?;
                Ok(fingerprint)
            }
        }
    }

    /// Query triples, ordered (tier desc, confidence desc, creation asc) —
    /// a testable property (spec §8).
    pub async fn query(&self, query: TripleQuery) -> Result<Vec<SpoTriple>> {
        let mut normalized = query;
        normalized.subject = normalized.subject.map(|s| normalize_entity(&s));
        normalized.predicate = normalized.predicate.map(|p| normalize_entity(&p));
        self.persistence.query(&normalized).await
    }

    pub async fn get(&self, fingerprint: &TripleFingerprint) -> Result<Option<SpoTriple>> {
        self.persistence.get(fingerprint).await
    }

    /// Idempotent on the fingerprint pair (spec §4.1).
    pub async fn record_conflict(
        &self,
        a_fp: &TripleFingerprint,
        b_fp: &TripleFingerprint,
        kind: ConflictKind,
    ) -> Result<ConflictRecord> {
        self.persistence.record_conflict(a_fp, b_fp, kind).await
    }

    pub async fn update_conflict_status(
        &self,
        a_fp: &TripleFingerprint,
        b_fp: &TripleFingerprint,
        status: ConflictStatus,
    ) -> Result<()> {
        self.persistence.update_conflict_status(a_fp, b_fp, status).await
    }

    pub async fn conflicts_touching(&self, fingerprint: &TripleFingerprint) -> Result<Vec<ConflictRecord>> {
        self.persistence.conflicts_touching(fingerprint).await
    }

    /// Appends an invalidation link; `query` with default flags excludes
    /// the superseded triple thereafter (spec §4.1).
    pub async fn supersede(&self, old_fp: &TripleFingerprint, new_fp: &TripleFingerprint) -> Result<()> {
        self.persistence.mark_superseded(old_fp, new_fp).await
    }

    /// Persist an already-built triple verbatim — fingerprint, combined
    /// provenance, and tier included — bypassing `insert`'s
    /// canonicalize-and-merge-by-content path. Used by the conflict-ladder
    /// rung-1 auto-merge, which has already computed the merged
    /// fingerprint, combined the two triples' provenance, and taken the
    /// higher of the two tiers itself (spec §4.3).
    pub async fn upsert_merged(&self, triple: SpoTriple) -> Result<TripleFingerprint> {
        let fingerprint = triple.fingerprint;
        self.persistence.upsert(triple).await?;
        Ok(fingerprint)
    }

    pub async fn stats_by_tier(&self) -> Result<TierStats> {
        self.persistence.stats_by_tier().await
    }

    /// Promote (never demote) a triple's tier. `FactPersistence`
    /// implementations enforce the monotonicity invariant and return
    /// `Error::Fatal` on an attempted demotion (spec §3 invariant ii, §8).
    pub async fn set_tier(&self, fingerprint: &TripleFingerprint, tier: Tier) -> Result<()> {
        self.persistence.set_tier(fingerprint, tier).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact_store::persistence::InMemoryFactPersistence;

    fn store() -> FactStore {
        FactStore::new(Arc::new(InMemoryFactPersistence::new()))
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = store();
        let fp = store
            .insert("SolarKit", "Cost", "15000 EUR", "calc", 0.5)
            .await
            .unwrap();
        let triple = store.get(&fp).await.unwrap().unwrap();
        assert_eq!(triple.subject, "solar kit");
        assert_eq!(triple.tier, Tier::Bronze);
    }

    #[tokio::test]
    async fn malformed_bare_numeric_is_rejected() {
        let store = store();
        let err = store
            .insert("SolarKit", "Count", "15000", "calc", 0.5)
            .await
            .unwrap_err();
        matches!(err, Error::InvalidInput(_));
    }

    #[tokio::test]
    async fn reinsert_same_fingerprint_merges_provenance() {
        let store = store();
        let fp1 = store
            .insert("Grid", "Price", "0.42 EUR/kWh", "utility-api", 0.5)
            .await
            .unwrap();
        let fp2 = store
            .insert("Grid", "Price", "0.42 EUR/kWh", "utility-api", 0.9)
            .await
            .unwrap();
        assert_eq!(fp1, fp2);
        let triple = store.get(&fp1).await.unwrap().unwrap();
        assert_eq!(triple.provenance, vec!["utility-api".to_string()]);
    }

    #[tokio::test]
    async fn query_orders_deterministically() {
        let store = store();
        store.insert("A", "P", "1 kg", "s1", 0.9).await.unwrap();
        let gold_fp = store.insert("B", "P", "2 kg", "s2", 0.1).await.unwrap();
        store.set_tier(&gold_fp, Tier::Gold).await.unwrap();
        let results = store.query(TripleQuery::default()).await.unwrap();
        assert_eq!(results[0].tier, Tier::Gold);
    }

    #[tokio::test]
    async fn set_tier_refuses_demotion() {
        let store = store();
        let fp = store.insert("A", "P", "1 kg", "s1", 0.9).await.unwrap();
        store.set_tier(&fp, Tier::Gold).await.unwrap();
        let err = store.set_tier(&fp, Tier::Silver).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
