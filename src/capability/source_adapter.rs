//! The `SourceAdapter` capability (spec §6): external-source collectors,
//! consumed as an opaque ordered sequence of raw text + provenance. The
//! core assigns its own fingerprint on ingest and never inspects the
//! adapter's internals.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cancel::Cancel;
use crate::error::Result;

/// The kind of external source a query should be routed to. Left
/// extensible (spec treats `SourceAdapter` as opaque); the core only needs
/// enough structure to route and to record provenance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SourceKind {
    Web,
    Forum,
    Document,
    Api,
    Other(String),
}

/// One opaque entry returned by a fetch: text, originating source
/// identifier, and observation timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    pub text: String,
    pub source_id: String,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(
        &self,
        query: &str,
        source_kind: &SourceKind,
        cancel: Cancel,
    ) -> Result<Vec<SourceEntry>>;
}
