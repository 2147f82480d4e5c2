//! Error taxonomy for the reconstruction pipeline.
//!
//! Every variant except the missing-fragment signature handled inside the
//! retry controller propagates immediately to the caller; there is no other
//! automatic recovery. A state-hash mismatch after a successful execution is
//! deliberately NOT here: it is a flag on the trace report, not an error.

use crate::cell::Hash256;

#[derive(thiserror::Error, Debug)]
pub enum RetraceError {
    /// No matching chain object for a hash, block coordinate, or range.
    #[error("not found: {0}")]
    NotFound(String),

    /// Cross-checked identifiers disagree. Fatal, never retried.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// Transaction description is not the generic replayable shape.
    #[error("unsupported transaction shape: {0}")]
    UnsupportedTransactionShape(String),

    /// The execution engine reported non-success for a reason other than the
    /// recognized missing-fragment signature.
    #[error("engine failure at lt {lt}: {reason}")]
    EngineFailure {
        lt: u64,
        reason: String,
        logs: String,
        vm_log: String,
    },

    /// Every content provider failed for a required fragment.
    #[error("library fragment {0} unavailable from all providers")]
    LibraryUnavailable(Hash256),

    /// Network/transport failure from a chain-data provider.
    #[error("provider error: {0}")]
    Provider(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RetraceError>;

impl RetraceError {
    /// Shorthand for a not-found with formatted context.
    pub fn not_found(what: impl Into<String>) -> Self {
        RetraceError::NotFound(what.into())
    }
}
