//! Error types for sro-core.

use thiserror::Error;

/// Result type alias using sro-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// The six error kinds the reasoning-and-knowledge core distinguishes,
/// plus two carriers for lower-level failures (storage, serialization).
///
/// Propagation policy: only [`Error::Fatal`] terminates a session. Every
/// other variant is recorded in the event log and execution continues.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed session config, axiom file, or triple on ingest. Surfaced, no retry.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// LanguageModel or SourceAdapter reported a transient failure. The
    /// caller retries the specific call (see [`crate::capability::retry`]).
    #[error("capability transient failure ({capability}): {message}")]
    CapabilityTransient { capability: String, message: String },

    /// Capability reported a permanent failure. In-flight expansion is
    /// rolled back; MCTS continues with the next selection.
    #[error("capability permanent failure ({capability}): {message}")]
    CapabilityPermanent { capability: String, message: String },

    /// A variant or axiom response could not be parsed. Logged at warning
    /// severity by the caller; the session does not fail.
    #[error("parse failure: {0}")]
    ParseFailure(String),

    /// Two tasks attempted to expand the same node; the loser re-selects.
    #[error("contention on node {0}")]
    Contention(String),

    /// An invariant was violated (tier monotonicity, weight sum, axiom
    /// mutation mid-session). The session transitions to `failed`.
    #[error("fatal invariant violation: {0}")]
    Fatal(String),

    /// Persistence-layer failure from a `FactPersistence` implementation.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn capability_transient(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CapabilityTransient {
            capability: capability.into(),
            message: message.into(),
        }
    }

    pub fn capability_permanent(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CapabilityPermanent {
            capability: capability.into(),
            message: message.into(),
        }
    }

    pub fn parse_failure(message: impl Into<String>) -> Self {
        Self::ParseFailure(message.into())
    }

    pub fn contention(node_id: impl Into<String>) -> Self {
        Self::Contention(node_id.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// True if this error kind is one the core retries automatically.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::CapabilityTransient { .. })
    }

    /// True if this error kind must terminate the owning session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Fatal(_))
    }
}
