//! Proposal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::executor::ToolAction;

/// Lifecycle state of a proposal.
///
/// `Committed` and `Rejected` are terminal: a proposal in either state
/// can never be committed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Proposed, not yet decided.
    Pending,
    /// All gates passed and execution was authorized.
    Committed,
    /// A gate failed; the mandate itself must change before retrying.
    Rejected,
}

impl ProposalStatus {
    /// Returns the status as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Committed => "committed",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed tool action awaiting (or past) its commit decision.
///
/// Proposals live in the owning kernel instance for its lifetime; they
/// are transient state, not part of the durable audit trail (the
/// `SUGGESTION` event is).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Unique id (`proposal_<uuid7>`).
    pub id: String,

    /// The captured action, exactly as proposed.
    pub action: ToolAction,

    /// The mirror entry capturing the request.
    pub mirror_ref: String,

    /// The `SUGGESTION` event recording the proposal.
    pub event_id: String,

    /// Current lifecycle state.
    pub status: ProposalStatus,

    /// When the proposal was created.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings() {
        assert_eq!(ProposalStatus::Pending.as_str(), "pending");
        assert_eq!(ProposalStatus::Committed.as_str(), "committed");
        assert_eq!(ProposalStatus::Rejected.as_str(), "rejected");
    }

    #[test]
    fn proposal_serde_round_trip() {
        let proposal = Proposal {
            id: "proposal_1".to_string(),
            action: ToolAction::new("read_file", serde_json::json!({"path": "/tmp/x"})),
            mirror_ref: "mirror_1".to_string(),
            event_id: "evt_1".to_string(),
            status: ProposalStatus::Pending,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&proposal).unwrap();
        let back: Proposal = serde_json::from_str(&json).unwrap();
        assert_eq!(proposal, back);
    }
}
