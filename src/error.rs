//! Top-level error taxonomy for the retrieval core.

use thiserror::Error;

pub type StarResult<T> = Result<T, StarError>;

#[derive(Debug, Error)]
pub enum StarError {
    #[error("query malformed: {0}")]
    QueryMalformed(String),

    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("vector index missing: {0}")]
    VectorIndexMissing(String),

    #[error("embedder unavailable: {0}")]
    EmbedderUnavailable(String),

    #[error("mirror store miss for {0}")]
    MirrorMiss(String),

    #[error("operation exceeded its deadline")]
    Deadline,

    #[error("internal invariant violated: {0}")]
    InternalInvariantViolated(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StarError {
    /// Raise an invariant violation, logging it as an error as it is raised
    /// (these should never be routine — a caller swallowing one silently
    /// would hide a bug, so the log happens here rather than relying on
    /// every call site to remember).
    pub fn invariant(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::error!(invariant = %msg, "internal invariant violated");
        StarError::InternalInvariantViolated(msg)
    }
}
