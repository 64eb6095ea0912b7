//! Kernel error types.
//!
//! The `Display` forms of [`CommitError`]'s gate variants are the stable
//! boundary contract: front-ends and tests match on the leading tag
//! (`PROPOSAL_NOT_FOUND`, `INVALID_MANDATE: ...`, and so on). Fault
//! variants wrap the underlying module errors transparently.

use taugate_core::canonical::CanonicalError;
use taugate_core::events::EventLogError;
use taugate_core::mirror::MirrorError;
use taugate_core::receipt::{ReceiptChainError, ReceiptError};
use thiserror::Error;

use crate::executor::ToolExecutorError;

/// Errors returned by `propose`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProposeError {
    /// The action could not be canonicalized for capture.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),

    /// The mirror rejected the capture.
    #[error(transparent)]
    Mirror(#[from] MirrorError),

    /// The `SUGGESTION` event could not be appended.
    #[error(transparent)]
    EventLog(#[from] EventLogError),
}

/// Errors returned by `commit`.
///
/// The first six variants are gate outcomes with stable tags; the rest
/// are faults from the underlying modules or the tool executor.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CommitError {
    /// No proposal exists under the given id.
    #[error("PROPOSAL_NOT_FOUND")]
    ProposalNotFound,

    /// The proposal was already committed.
    #[error("PROPOSAL_COMMITTED")]
    ProposalCommitted,

    /// The proposal was already rejected.
    #[error("PROPOSAL_REJECTED")]
    ProposalRejected,

    /// Mandate verification failed (signature, validity, or revocation).
    #[error("INVALID_MANDATE: {0}")]
    InvalidMandate(String),

    /// The mandate is revoked.
    #[error("REVOKED_MANDATE: {0}")]
    RevokedMandate(String),

    /// The action is outside the mandate's scope, or a configured gate
    /// hook vetoed it.
    #[error("SCOPE_VIOLATION: {0}")]
    ScopeViolation(String),

    /// The tool executor failed after execution was authorized.
    #[error("execution failed: {0}")]
    Execution(#[from] ToolExecutorError),

    /// An event append failed.
    #[error(transparent)]
    EventLog(#[from] EventLogError),

    /// Receipt issuance or verification failed.
    #[error(transparent)]
    Receipt(#[from] ReceiptError),

    /// The receipt chain could not be extended.
    #[error(transparent)]
    ReceiptChain(#[from] ReceiptChainError),

    /// The mirror rejected the response capture.
    #[error(transparent)]
    Mirror(#[from] MirrorError),

    /// Canonicalization failed while hashing the output.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),
}
