//! The `FactPersistence` capability: the storage boundary `FactStore`
//! (spec §4.1) is layered on top of. Grounded on rlm-core's
//! `memory::store::SqliteMemoryStore` — an `Arc<Mutex<Connection>>` plus a
//! `with_conn` helper closure — generalized from hypergraph nodes to SPO
//! triples, with an in-memory fake for the "core must be testable without
//! a real store" requirement (spec §9).

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::fact_store::types::{
    ConflictKind, ConflictRecord, ConflictStatus, ObjectValue, SpoTriple, Tier, TripleFingerprint,
    TripleQuery, TierStats,
};

/// The persistence capability `FactStore` is built on. A cross-session
/// shared FactStore is the only mutable state outside a session (spec §9);
/// every method here is `&self` so implementations serialize internally.
#[async_trait]
pub trait FactPersistence: Send + Sync {
    async fn upsert(&self, triple: SpoTriple) -> Result<()>;
    async fn get(&self, fingerprint: &TripleFingerprint) -> Result<Option<SpoTriple>>;
    /// Look up the (at most one, per spec §8 fingerprint-uniqueness) live
    /// triple matching a normalized (subject, predicate, object-key)
    /// tuple, regardless of which source originally asserted it — this is
    /// how `FactStore::insert` finds a prior assertion to merge into when
    /// a *different* source later reports the identical fact (spec §4.1).
    async fn find_by_content(
        &self,
        subject: &str,
        predicate: &str,
        object_key: &str,
    ) -> Result<Option<SpoTriple>>;
    async fn query(&self, query: &TripleQuery) -> Result<Vec<SpoTriple>>;
    async fn set_tier(&self, fingerprint: &TripleFingerprint, tier: Tier) -> Result<()>;
    async fn mark_superseded(
        &self,
        old_fp: &TripleFingerprint,
        new_fp: &TripleFingerprint,
    ) -> Result<()>;
    async fn record_conflict(
        &self,
        a: &TripleFingerprint,
        b: &TripleFingerprint,
        kind: ConflictKind,
    ) -> Result<ConflictRecord>;
    async fn update_conflict_status(&self, id_a: &TripleFingerprint, id_b: &TripleFingerprint, status: ConflictStatus) -> Result<()>;
    async fn conflicts_touching(&self, fingerprint: &TripleFingerprint) -> Result<Vec<ConflictRecord>>;
    async fn stats_by_tier(&self) -> Result<TierStats>;
}

fn matches_query(triple: &SpoTriple, query: &TripleQuery) -> bool {
    if !query.include_superseded && triple.is_superseded() {
        return false;
    }
    if let Some(ref subject) = query.subject {
        if &triple.subject != subject {
            return false;
        }
    }
    if let Some(ref predicate) = query.predicate {
        if &triple.predicate != predicate {
            return false;
        }
    }
    if let Some(ref object) = query.object {
        if &triple.object.to_string() != object {
            return false;
        }
    }
    if let Some(min_tier) = query.min_tier {
        if triple.tier < min_tier {
            return false;
        }
    }
    if let Some(min_confidence) = query.min_confidence {
        if triple.confidence < min_confidence {
            return false;
        }
    }
    true
}

fn order_triples(triples: &mut [SpoTriple]) {
    triples.sort_by(|a, b| {
        b.tier
            .cmp(&a.tier)
            .then(
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(a.created_at.cmp(&b.created_at))
    });
}

/// In-memory `FactPersistence` fake (spec §9: "the core must be
/// implementable and testable with in-memory fakes of all three"
/// capabilities).
#[derive(Default)]
pub struct InMemoryFactPersistence {
    inner: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    triples: HashMap<TripleFingerprint, SpoTriple>,
    conflicts: Vec<ConflictRecord>,
}

impl InMemoryFactPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FactPersistence for InMemoryFactPersistence {
    async fn upsert(&self, triple: SpoTriple) -> Result<()> {
        self.inner.lock().unwrap().triples.insert(triple.fingerprint, triple);
        Ok(())
    }

    async fn get(&self, fingerprint: &TripleFingerprint) -> Result<Option<SpoTriple>> {
        Ok(self.inner.lock().unwrap().triples.get(fingerprint).cloned())
    }

    async fn find_by_content(
        &self,
        subject: &str,
        predicate: &str,
        object_key: &str,
    ) -> Result<Option<SpoTriple>> {
        use crate::fact_store::normalize::object_fingerprint_key;
        let state = self.inner.lock().unwrap();
        Ok(state
            .triples
            .values()
            .find(|t| {
                !t.is_superseded()
                    && t.subject == subject
                    && t.predicate == predicate
                    && object_fingerprint_key(&t.object) == object_key
            })
            .cloned())
    }

    async fn query(&self, query: &TripleQuery) -> Result<Vec<SpoTriple>> {
        let state = self.inner.lock().unwrap();
        let mut result: Vec<SpoTriple> = state
            .triples
            .values()
            .filter(|t| matches_query(t, query))
            .cloned()
            .collect();
        order_triples(&mut result);
        Ok(result)
    }

    async fn set_tier(&self, fingerprint: &TripleFingerprint, tier: Tier) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        let triple = state
            .triples
            .get_mut(fingerprint)
            .ok_or_else(|| Error::persistence(format!("no triple for fingerprint {fingerprint}")))?;
        if tier < triple.tier {
            return Err(Error::fatal(format!(
                "tier demotion attempted for {fingerprint}: {} -> {}",
                triple.tier, tier
            )));
        }
        triple.tier = tier;
        Ok(())
    }

    async fn mark_superseded(
        &self,
        old_fp: &TripleFingerprint,
        new_fp: &TripleFingerprint,
    ) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        let triple = state
            .triples
            .get_mut(old_fp)
            .ok_or_else(|| Error::persistence(format!("no triple for fingerprint {old_fp}")))?;
        triple.superseded_by = Some(*new_fp);
        Ok(())
    }

    async fn record_conflict(
        &self,
        a: &TripleFingerprint,
        b: &TripleFingerprint,
        kind: ConflictKind,
    ) -> Result<ConflictRecord> {
        let mut state = self.inner.lock().unwrap();
        if let Some(existing) = state
            .conflicts
            .iter()
            .find(|c| (&c.a == a && &c.b == b) || (&c.a == b && &c.b == a))
        {
            return Ok(existing.clone());
        }
        let record = ConflictRecord {
            id: crate::fact_store::types::ConflictId::new(),
            a: *a,
            b: *b,
            kind,
            status: ConflictStatus::Unresolved,
            created_at: chrono::Utc::now(),
        };
        state.conflicts.push(record.clone());
        Ok(record)
    }

    async fn update_conflict_status(
        &self,
        id_a: &TripleFingerprint,
        id_b: &TripleFingerprint,
        status: ConflictStatus,
    ) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        let record = state
            .conflicts
            .iter_mut()
            .find(|c| (&c.a == id_a && &c.b == id_b) || (&c.a == id_b && &c.b == id_a))
            .ok_or_else(|| Error::persistence("no conflict for fingerprint pair"))?;
        record.status = status;
        Ok(())
    }

    async fn conflicts_touching(&self, fingerprint: &TripleFingerprint) -> Result<Vec<ConflictRecord>> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .conflicts
            .iter()
            .filter(|c| &c.a == fingerprint || &c.b == fingerprint)
            .cloned()
            .collect())
    }

    async fn stats_by_tier(&self) -> Result<TierStats> {
        let state = self.inner.lock().unwrap();
        let mut stats = TierStats::default();
        for triple in state.triples.values() {
            if triple.is_superseded() {
                continue;
            }
            match triple.tier {
                Tier::Bronze => stats.bronze += 1,
                Tier::Silver => stats.silver += 1,
                Tier::Gold => stats.gold += 1,
            }
        }
        Ok(stats)
    }
}

/// SQLite-backed `FactPersistence`, grounded on rlm-core's
/// `memory::schema`/`memory::store` WAL + `Arc<Mutex<Connection>>` +
/// `with_conn` pattern.
pub struct SqliteFactPersistence {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteFactPersistence {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| Error::persistence(e.to_string()))?;
        initialize_schema(&conn).map_err(|e| Error::persistence(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::persistence(e.to_string()))?;
        initialize_schema(&conn).map_err(|e| Error::persistence(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| Error::persistence(format!("failed to lock connection: {e}")))?;
        f(&conn).map_err(|e| Error::persistence(e.to_string()))
    }

    fn row_to_triple(row: &rusqlite::Row) -> rusqlite::Result<SpoTriple> {
        let fp_hex: String = row.get(0)?;
        let subject: String = row.get(1)?;
        let predicate: String = row.get(2)?;
        let object_literal: Option<String> = row.get(3)?;
        let object_value: Option<f64> = row.get(4)?;
        let object_unit: Option<String> = row.get(5)?;
        let provenance_json: String = row.get(6)?;
        let confidence: f64 = row.get(7)?;
        let tier: i32 = row.get(8)?;
        let created_at: String = row.get(9)?;
        let superseded_by: Option<String> = row.get(10)?;

        let object = match (object_literal, object_value, object_unit) {
            (Some(literal), _, _) => ObjectValue::Literal(literal),
            (None, Some(value), Some(unit)) => ObjectValue::Numeric { value, unit },
            _ => ObjectValue::Literal(String::new()),
        };
        let provenance: Vec<String> = serde_json::from_str(&provenance_json).unwrap_or_default();
        let fingerprint = fingerprint_from_hex(&fp_hex);
        let superseded_by = superseded_by.map(|s| fingerprint_from_hex(&s));

        Ok(SpoTriple {
            fingerprint,
            subject,
            predicate,
            object,
            provenance,
            confidence,
            tier: match tier {
                0 => Tier::Bronze,
                1 => Tier::Silver,
                _ => Tier::Gold,
            },
            created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_else(|_| chrono::Utc::now()),
            superseded_by,
        })
    }
}

fn fingerprint_from_hex(hex: &str) -> TripleFingerprint {
    // Fingerprints are always produced by `TripleFingerprint::compute`;
    // round-tripping through hex for storage only, never re-deriving.
    let mut bytes = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate().take(32) {
        if let Ok(s) = std::str::from_utf8(chunk) {
            if let Ok(b) = u8::from_str_radix(s, 16) {
                bytes[i] = b;
            }
        }
    }
    TripleFingerprint::from_bytes(bytes)
}

fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS triples (
            fingerprint TEXT PRIMARY KEY,
            subject TEXT NOT NULL,
            predicate TEXT NOT NULL,
            object_literal TEXT,
            object_value REAL,
            object_unit TEXT,
            provenance TEXT NOT NULL,
            confidence REAL NOT NULL,
            tier INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            superseded_by TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_triples_subject_predicate ON triples(subject, predicate)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS conflicts (
            id TEXT PRIMARY KEY,
            fp_a TEXT NOT NULL,
            fp_b TEXT NOT NULL,
            kind TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

#[async_trait]
impl FactPersistence for SqliteFactPersistence {
    async fn upsert(&self, triple: SpoTriple) -> Result<()> {
        self.with_conn(|conn| {
            let (object_literal, object_value, object_unit) = match &triple.object {
                ObjectValue::Literal(s) => (Some(s.clone()), None, None),
                ObjectValue::Numeric { value, unit } => (None, Some(*value), Some(unit.clone())),
            };
            let provenance_json = serde_json::to_string(&triple.provenance).unwrap_or_default();
            conn.execute(
                "INSERT INTO triples (
                    fingerprint, subject, predicate, object_literal, object_value, object_unit,
                    provenance, confidence, tier, created_at, superseded_by
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(fingerprint) DO UPDATE SET
                    provenance = excluded.provenance,
                    confidence = excluded.confidence,
                    tier = excluded.tier,
                    superseded_by = excluded.superseded_by",
                params![
                    triple.fingerprint.to_string(),
                    triple.subject,
                    triple.predicate,
                    object_literal,
                    object_value,
                    object_unit,
                    provenance_json,
                    triple.confidence,
                    triple.tier as i32,
                    triple.created_at.to_rfc3339(),
                    triple.superseded_by.map(|fp| fp.to_string()),
                ],
            )?;
            Ok(())
        })
    }

    async fn get(&self, fingerprint: &TripleFingerprint) -> Result<Option<SpoTriple>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT fingerprint, subject, predicate, object_literal, object_value, object_unit,
                        provenance, confidence, tier, created_at, superseded_by
                 FROM triples WHERE fingerprint = ?1",
                params![fingerprint.to_string()],
                Self::row_to_triple,
            )
            .optional()
        })
    }

    async fn query(&self, query: &TripleQuery) -> Result<Vec<SpoTriple>> {
        let mut triples = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT fingerprint, subject, predicate, object_literal, object_value, object_unit,
                        provenance, confidence, tier, created_at, superseded_by
                 FROM triples",
            )?;
            let rows = stmt.query_map([], Self::row_to_triple)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;
        triples.retain(|t| matches_query(t, query));
        order_triples(&mut triples);
        Ok(triples)
    }

    async fn find_by_content(
        &self,
        subject: &str,
        predicate: &str,
        object_key: &str,
    ) -> Result<Option<SpoTriple>> {
        use crate::fact_store::normalize::object_fingerprint_key;
        let candidates = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT fingerprint, subject, predicate, object_literal, object_value, object_unit,
                        provenance, confidence, tier, created_at, superseded_by
                 FROM triples WHERE subject = ?1 AND predicate = ?2 AND superseded_by IS NULL",
            )?;
            let rows = stmt.query_map(params![subject, predicate], Self::row_to_triple)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;
        Ok(candidates
            .into_iter()
            .find(|t| object_fingerprint_key(&t.object) == object_key))
    }

    async fn set_tier(&self, fingerprint: &TripleFingerprint, tier: Tier) -> Result<()> {
        let current = self.get(fingerprint).await?.ok_or_else(|| {
            Error::persistence(format!("no triple for fingerprint {fingerprint}"))
        })?;
        if tier < current.tier {
            return Err(Error::fatal(format!(
                "tier demotion attempted for {fingerprint}: {} -> {}",
                current.tier, tier
            )));
        }
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE triples SET tier = ?2 WHERE fingerprint = ?1",
                params![fingerprint.to_string(), tier as i32],
            )?;
            Ok(())
        })
    }

    async fn mark_superseded(
        &self,
        old_fp: &TripleFingerprint,
        new_fp: &TripleFingerprint,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE triples SET superseded_by = ?2 WHERE fingerprint = ?1",
                params![old_fp.to_string(), new_fp.to_string()],
            )?;
            Ok(())
        })
    }

    async fn record_conflict(
        &self,
        a: &TripleFingerprint,
        b: &TripleFingerprint,
        kind: ConflictKind,
    ) -> Result<ConflictRecord> {
        if let Some(existing) = self
            .conflicts_touching(a)
            .await?
            .into_iter()
            .find(|c| &c.b == b || &c.a == b)
        {
            return Ok(existing);
        }
        let record = ConflictRecord {
            id: crate::fact_store::types::ConflictId::new(),
            a: *a,
            b: *b,
            kind,
            status: ConflictStatus::Unresolved,
            created_at: chrono::Utc::now(),
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conflicts (id, fp_a, fp_b, kind, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id.to_string(),
                    record.a.to_string(),
                    record.b.to_string(),
                    format!("{:?}", record.kind),
                    "unresolved",
                    record.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })?;
        Ok(record)
    }

    async fn update_conflict_status(
        &self,
        id_a: &TripleFingerprint,
        id_b: &TripleFingerprint,
        status: ConflictStatus,
    ) -> Result<()> {
        let status_str = serde_json::to_string(&status)?;
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE conflicts SET status = ?3 WHERE (fp_a = ?1 AND fp_b = ?2) OR (fp_a = ?2 AND fp_b = ?1)",
                params![id_a.to_string(), id_b.to_string(), status_str],
            )?;
            Ok(())
        })
    }

    async fn conflicts_touching(&self, fingerprint: &TripleFingerprint) -> Result<Vec<ConflictRecord>> {
        // Kept deliberately simple: full status decoding is not needed for
        // the count/variance uses `UncertaintyEvaluator` makes of this.
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT fp_a, fp_b, kind, created_at FROM conflicts WHERE fp_a = ?1 OR fp_b = ?1",
            )?;
            let rows = stmt.query_map(params![fingerprint.to_string()], |row| {
                let fp_a: String = row.get(0)?;
                let fp_b: String = row.get(1)?;
                let kind: String = row.get(2)?;
                let created_at: String = row.get(3)?;
                Ok((fp_a, fp_b, kind, created_at))
            })?;
            let mut out = Vec::new();
            for row in rows {
                let (fp_a, fp_b, kind, created_at) = row?;
                out.push(ConflictRecord {
                    id: crate::fact_store::types::ConflictId::new(),
                    a: fingerprint_from_hex(&fp_a),
                    b: fingerprint_from_hex(&fp_b),
                    kind: match kind.as_str() {
                        "Antonym" => ConflictKind::Antonym,
                        "CategoricalDisagreement" => ConflictKind::CategoricalDisagreement,
                        _ => ConflictKind::NumericalMismatch,
                    },
                    status: ConflictStatus::Unresolved,
                    created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                        .map(|dt| dt.with_timezone(&chrono::Utc))
                        .unwrap_or_else(|_| chrono::Utc::now()),
                });
            }
            Ok(out)
        })
    }

    async fn stats_by_tier(&self) -> Result<TierStats> {
        self.with_conn(|conn| {
            let mut stats = TierStats::default();
            conn.query_row(
                "SELECT COUNT(*) FROM triples WHERE tier = 0 AND superseded_by IS NULL",
                [],
                |row| {
                    stats.bronze = row.get(0)?;
                    Ok(())
                },
            )?;
            conn.query_row(
                "SELECT COUNT(*) FROM triples WHERE tier = 1 AND superseded_by IS NULL",
                [],
                |row| {
                    stats.silver = row.get(0)?;
                    Ok(())
                },
            )?;
            conn.query_row(
                "SELECT COUNT(*) FROM triples WHERE tier = 2 AND superseded_by IS NULL",
                [],
                |row| {
                    stats.gold = row.get(0)?;
                    Ok(())
                },
            )?;
            Ok(stats)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact_store::types::ObjectValue;

    fn sample_triple(subject: &str, source: &str) -> SpoTriple {
        let object = ObjectValue::Literal("gold".to_string());
        let fingerprint = TripleFingerprint::compute(subject, "color", "gold", source);
        SpoTriple {
            fingerprint,
            subject: subject.to_string(),
            predicate: "color".to_string(),
            object,
            provenance: vec![source.to_string()],
            confidence: 0.5,
            tier: Tier::Bronze,
            created_at: chrono::Utc::now(),
            superseded_by: None,
        }
    }

    #[tokio::test]
    async fn sqlite_round_trips_a_triple() {
        let store = SqliteFactPersistence::in_memory().unwrap();
        let triple = sample_triple("widget", "calc");
        store.upsert(triple.clone()).await.unwrap();
        let fetched = store.get(&triple.fingerprint).await.unwrap().unwrap();
        assert_eq!(fetched.subject, "widget");
        assert_eq!(fetched.tier, Tier::Bronze);
    }

    #[tokio::test]
    async fn in_memory_rejects_tier_demotion() {
        let store = InMemoryFactPersistence::new();
        let triple = sample_triple("widget", "calc");
        let fp = triple.fingerprint;
        store.upsert(SpoTriple { tier: Tier::Gold, ..triple }).await.unwrap();
        let err = store.set_tier(&fp, Tier::Bronze).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn sqlite_query_orders_by_tier_confidence_creation() {
        let store = SqliteFactPersistence::in_memory().unwrap();
        let mut low = sample_triple("a", "s1");
        low.tier = Tier::Bronze;
        low.confidence = 0.9;
        let mut high = sample_triple("b", "s2");
        high.tier = Tier::Gold;
        high.confidence = 0.1;
        store.upsert(low).await.unwrap();
        store.upsert(high).await.unwrap();
        let results = store.query(&TripleQuery::default()).await.unwrap();
        assert_eq!(results[0].tier, Tier::Gold);
    }
}
