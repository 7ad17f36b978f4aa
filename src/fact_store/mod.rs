//! FactStore (C1): content-addressed SPO triples with tier, provenance,
//! and confidence (spec §4.1).

mod normalize;
mod persistence;
#[cfg(test)]
mod proptest;
mod store;
mod types;

pub use normalize::{normalize_entity, normalize_object, relative_divergence};
pub use persistence::{FactPersistence, InMemoryFactPersistence, SqliteFactPersistence};
pub use store::FactStore;
pub use types::{
    ConflictId, ConflictKind, ConflictRecord, ConflictStatus, ObjectValue, SpoTriple, Tier,
    TierStats, TripleFingerprint, TripleQuery,
};
