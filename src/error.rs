//! Engine error taxonomy.
//!
//! Keep this focused on failures a caller can act on. Per-file problems
//! during a scan are recovered inside the loader (counted and logged);
//! only failures that change what a specific request receives live here.

use thiserror::Error;

/// Result type used across the ingestion/aggregation engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-level error.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A record was unparseable or lacked its identity field.
    /// The loader treats this as a skip; the mutation endpoint surfaces it.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// A mutation could not be persisted to the watched directory.
    #[error("write failed: {0}")]
    WriteFailure(String),

    /// Recomputation exceeded its budget and no previous snapshot exists.
    #[error("recompute timed out after {0}s with no previous snapshot")]
    RecomputeTimeout(u64),

    /// An unknown entity kind was requested.
    #[error("unknown entity kind: {0}")]
    UnknownKind(String),
}

impl EngineError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedRecord(msg.into())
    }

    pub fn write_failure(msg: impl Into<String>) -> Self {
        Self::WriteFailure(msg.into())
    }

    pub fn unknown_kind(kind: impl Into<String>) -> Self {
        Self::UnknownKind(kind.into())
    }
}
