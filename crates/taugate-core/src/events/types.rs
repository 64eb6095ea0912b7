//! Event types and payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::ActorId;
use crate::canonical::{self, CanonicalError, ContentHash};

/// Discriminant of an event, matching the wire `type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// A mandate was created and signed.
    MandateCreate,
    /// A mandate was revoked.
    MandateRevoke,
    /// An agent proposed an action.
    Suggestion,
    /// A proposal passed all gates and execution was authorized.
    Committed,
    /// A receipt was issued for an executed action.
    ReceiptIssued,
    /// A proposal was rejected at a gate.
    ProposalRejected,
    /// A mandate failed verification outside the commit path.
    VerificationFailed,
    /// The tool executor failed after execution was authorized.
    ExecutionFailed,
}

impl EventKind {
    /// Returns the wire tag for this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MandateCreate => "MANDATE_CREATE",
            Self::MandateRevoke => "MANDATE_REVOKE",
            Self::Suggestion => "SUGGESTION",
            Self::Committed => "COMMITTED",
            Self::ReceiptIssued => "RECEIPT_ISSUED",
            Self::ProposalRejected => "PROPOSAL_REJECTED",
            Self::VerificationFailed => "VERIFICATION_FAILED",
            Self::ExecutionFailed => "EXECUTION_FAILED",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed event payload, serialized as a `type` tag plus a `payload` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum EventPayload {
    /// A mandate was created and signed.
    MandateCreate {
        /// Id of the new mandate.
        mandate_id: String,
        /// The issuing actor.
        issuer: ActorId,
        /// The delegated actor.
        delegate: ActorId,
    },

    /// A mandate was revoked. Presence of any such event for a mandate id
    /// makes that mandate permanently invalid.
    MandateRevoke {
        /// Id of the revoked mandate.
        mandate_id: String,
        /// Human-readable reason for the revocation.
        reason: String,
        /// The actor that requested revocation.
        revoked_by: ActorId,
    },

    /// An agent proposed an action. Recorded before any verification.
    Suggestion {
        /// Mirror entry capturing the proposed request.
        mirror_ref: String,
        /// The proposing agent.
        agent_id: ActorId,
        /// The proposed action, verbatim.
        proposed_action: serde_json::Value,
        /// Estimated cost in the smallest currency unit, if known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        estimated_cost: Option<u64>,
    },

    /// All gates passed; execution was authorized. Appended before the
    /// tool executor runs, so a failed execution still leaves this record.
    Committed {
        /// The committed proposal.
        proposal_id: String,
        /// The authorizing mandate.
        mandate_id: String,
        /// The tool/action string that was authorized.
        action: String,
    },

    /// A signed receipt was issued for an executed action.
    ReceiptIssued {
        /// Id of the issued receipt.
        receipt_id: String,
        /// The authorizing mandate.
        mandate_id: String,
        /// The committed proposal.
        proposal_id: String,
    },

    /// A proposal was rejected at a commit gate.
    ProposalRejected {
        /// The rejected proposal.
        proposal_id: String,
        /// Stable rejection tag (`INVALID_MANDATE`, `REVOKED_MANDATE`,
        /// `SCOPE_VIOLATION`).
        reason: String,
        /// Accumulated detail messages from the failing gate.
        details: Vec<String>,
    },

    /// A mandate failed verification outside the commit path.
    VerificationFailed {
        /// The mandate that failed verification.
        mandate_id: String,
        /// Accumulated verification errors.
        errors: Vec<String>,
    },

    /// The tool executor failed after the `COMMITTED` event was appended.
    ExecutionFailed {
        /// The proposal whose execution failed.
        proposal_id: String,
        /// The tool/action string that was attempted.
        action: String,
        /// The executor's error message.
        error: String,
    },
}

impl EventPayload {
    /// Returns the kind discriminant for this payload.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::MandateCreate { .. } => EventKind::MandateCreate,
            Self::MandateRevoke { .. } => EventKind::MandateRevoke,
            Self::Suggestion { .. } => EventKind::Suggestion,
            Self::Committed { .. } => EventKind::Committed,
            Self::ReceiptIssued { .. } => EventKind::ReceiptIssued,
            Self::ProposalRejected { .. } => EventKind::ProposalRejected,
            Self::VerificationFailed { .. } => EventKind::VerificationFailed,
            Self::ExecutionFailed { .. } => EventKind::ExecutionFailed,
        }
    }
}

/// A signed event in the hash-chained log.
///
/// Construct events through [`super::EventLog::append`], which assigns the
/// id and timestamp, links `prev_hash`, and signs. Direct construction is
/// only useful in tests and import paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event id (`evt_<uuid7>`, time-sortable).
    pub id: String,

    /// When the event was appended.
    pub timestamp: DateTime<Utc>,

    /// Typed payload; serializes as `type` + `payload`.
    #[serde(flatten)]
    pub payload: EventPayload,

    /// The actor whose key signed this event.
    pub signer: ActorId,

    /// Signature (128 hex chars) over the canonical event minus this field.
    pub signature: String,

    /// Canonical hash of the entire previous event; absent on the first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<ContentHash>,
}

impl Event {
    /// Returns the kind discriminant.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Returns the canonical bytes this event's signature covers.
    ///
    /// The `signature` key is removed — not emptied — before
    /// canonicalization; `id`, `timestamp`, and `prev_hash` are included.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError`] if the event cannot be canonicalized.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, CanonicalError> {
        let mut value = serde_json::to_value(self)?;
        if let Some(object) = value.as_object_mut() {
            object.remove("signature");
        }
        canonical::to_bytes(&value)
    }

    /// Computes the canonical hash of the entire event, signature included.
    ///
    /// This is the value the next event stores as `prev_hash`.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError`] if the event cannot be canonicalized.
    pub fn content_hash(&self) -> Result<ContentHash, CanonicalError> {
        canonical::hash(self)
    }
}

/// The caller-supplied part of an event, completed by the log on append.
#[derive(Debug, Clone)]
pub struct EventDraft {
    /// The typed payload to record.
    pub payload: EventPayload,
    /// The actor whose key signs the event.
    pub signer: ActorId,
}

impl EventDraft {
    /// Creates a draft event.
    #[must_use]
    pub const fn new(payload: EventPayload, signer: ActorId) -> Self {
        Self { payload, signer }
    }
}
