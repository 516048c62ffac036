//! Error taxonomy for the ingestion/retrieval/workflow engine.
//!
//! Every fallible core operation returns [`Error`]. The variants map to the
//! failure classes callers need to distinguish: caller mistakes rejected
//! before any I/O ([`Error::InvalidConfig`]), upstream model failures,
//! persistence failures, missing-or-not-owned resources, and runs that
//! exceeded their wall-clock budget.
//!
//! Per-file read failures during document collection are deliberately *not*
//! an `Error` variant — they are absorbed by the ingestion workflow and
//! surfaced as [`crate::files::ReadFailure`] values instead.

use thiserror::Error;

/// Result alias used throughout the core crates.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Caller error (bad chunk size, bad top_k, bad alpha). Rejected before
    /// any I/O is performed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The upstream embedding model call failed. The upstream message is
    /// carried verbatim.
    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// The upstream reasoning/LLM call failed (security workflow).
    #[error("reasoning provider error: {0}")]
    ReasoningProvider(String),

    /// A persistence operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Resource absent or not owned by the caller. The same variant is used
    /// for both cases so existence of other tenants' resources never leaks.
    #[error("resource not found")]
    NotFound,

    /// The workflow run exceeded its wall-clock budget.
    #[error("workflow run exceeded its {budget_secs}s budget")]
    Timeout { budget_secs: u64 },
}

impl Error {
    /// Stable machine-readable kind, persisted in audit records alongside
    /// the human-readable message.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidConfig(_) => "invalid_config",
            Error::EmbeddingProvider(_) => "embedding_provider",
            Error::ReasoningProvider(_) => "reasoning_provider",
            Error::Storage(_) => "storage",
            Error::NotFound => "not_found",
            Error::Timeout { .. } => "timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_is_stable() {
        assert_eq!(Error::NotFound.kind(), "not_found");
        assert_eq!(Error::Timeout { budget_secs: 600 }.kind(), "timeout");
        assert_eq!(
            Error::InvalidConfig("chunk_size must be > 0".into()).kind(),
            "invalid_config"
        );
    }

    #[test]
    fn test_message_carries_upstream_cause() {
        let err = Error::EmbeddingProvider("HTTP 503 from model server".into());
        assert!(err.to_string().contains("HTTP 503"));
    }
}
