//! The τ-Gate: the propose/commit state machine.
//!
//! The gate interposes between an agent and its tools. An agent may
//! propose anything; nothing executes until `commit` is presented with a
//! mandate that survives every gate:
//!
//! ```text
//! pending ──commit(valid, in-scope, unrevoked)──▸ committed
//! pending ──commit(bad signature/validity)──────▸ rejected  INVALID_MANDATE
//! pending ──commit(revoked)─────────────────────▸ rejected  REVOKED_MANDATE
//! pending ──commit(out-of-scope)────────────────▸ rejected  SCOPE_VIOLATION
//! committed ──commit(*)─────────────────────────▸ fails     PROPOSAL_COMMITTED
//! rejected ──commit(*)──────────────────────────▸ fails     PROPOSAL_REJECTED
//! (absent) ──commit(*)──────────────────────────▸ fails     PROPOSAL_NOT_FOUND
//! ```
//!
//! Every transition leaves signed evidence: a `SUGGESTION` at propose, a
//! `PROPOSAL_REJECTED` on any gate failure, and — for a successful commit
//! — `COMMITTED` then `RECEIPT_ISSUED`, in that order, with a signed
//! receipt appended to the receipt chain. `COMMITTED` is appended
//! *before* the executor runs, so a failed execution still leaves a
//! permanent, auditable attempt (`EXECUTION_FAILED` alongside it).
//!
//! # Fail-Closed
//!
//! Any ambiguity during verification is a rejection; the kernel never
//! downgrades a failure to a success. Partial successes (tool ran,
//! receipt signing failed) surface as errors with the `COMMITTED` event
//! standing as evidence of the attempt.
//!
//! # Locking
//!
//! A single operation lock serializes `propose`, `commit`, and
//! `verify_mandate` from entry to return, making each operation atomic
//! with respect to the others — including any gate hook's check-and-update
//! pair.

#![allow(clippy::missing_panics_doc)] // lock poisoning is unrecoverable

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use taugate_core::actor::ActorId;
use taugate_core::canonical;
use taugate_core::crypto::Keystore;
use taugate_core::events::{EventDraft, EventLog, EventPayload};
use taugate_core::mandate::{Mandate, MandateVerification};
use taugate_core::mirror::Mirror;
use taugate_core::receipt::{Receipt, ReceiptChain, ReceiptParams};
use tracing::{info, warn};
use uuid::Uuid;

use crate::budget::CommitGate;
use crate::error::{CommitError, ProposeError};
use crate::executor::{ToolAction, ToolExecutor};
use crate::proposal::{Proposal, ProposalStatus};

/// Result of a successful commit: the tool output and its receipt.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    /// The executor's output, verbatim.
    pub output: serde_json::Value,
    /// The signed receipt binding the execution to its mandate.
    pub receipt: Receipt,
}

/// The sovereignty gate for one agent/adapter pair.
///
/// Owns the proposal map and shares the keystore, event log, mirror, and
/// receipt chain (injectable for embedding into a larger deployment).
pub struct TauGate {
    agent: ActorId,
    adapter: ActorId,
    keystore: Arc<Keystore>,
    event_log: Arc<EventLog>,
    mirror: Arc<Mirror>,
    receipt_chain: Arc<ReceiptChain>,
    proposals: RwLock<HashMap<String, Proposal>>,
    executor: Box<dyn ToolExecutor>,
    gates: Vec<Box<dyn CommitGate>>,
    op_lock: Mutex<()>,
}

impl TauGate {
    /// Creates a gate with fresh in-memory state.
    ///
    /// `agent` is the proposing identity (signs `SUGGESTION` events);
    /// `adapter` is the gate's own identity (signs rejections, failures,
    /// and receipts).
    #[must_use]
    pub fn new(agent: ActorId, adapter: ActorId, executor: Box<dyn ToolExecutor>) -> Self {
        Self {
            agent,
            adapter,
            keystore: Arc::new(Keystore::new()),
            event_log: Arc::new(EventLog::new()),
            mirror: Arc::new(Mirror::new()),
            receipt_chain: Arc::new(ReceiptChain::new()),
            proposals: RwLock::new(HashMap::new()),
            executor,
            gates: Vec::new(),
            op_lock: Mutex::new(()),
        }
    }

    /// Replaces the keystore with a shared one.
    #[must_use]
    pub fn with_keystore(mut self, keystore: Arc<Keystore>) -> Self {
        self.keystore = keystore;
        self
    }

    /// Replaces the event log with a shared one.
    #[must_use]
    pub fn with_event_log(mut self, event_log: Arc<EventLog>) -> Self {
        self.event_log = event_log;
        self
    }

    /// Replaces the mirror with a shared one.
    #[must_use]
    pub fn with_mirror(mut self, mirror: Arc<Mirror>) -> Self {
        self.mirror = mirror;
        self
    }

    /// Replaces the receipt chain with a shared one.
    #[must_use]
    pub fn with_receipt_chain(mut self, receipt_chain: Arc<ReceiptChain>) -> Self {
        self.receipt_chain = receipt_chain;
        self
    }

    /// Adds an overridable commit gate, run after the built-in gates.
    #[must_use]
    pub fn with_gate(mut self, gate: Box<dyn CommitGate>) -> Self {
        self.gates.push(gate);
        self
    }

    /// Returns the keystore.
    #[must_use]
    pub fn keystore(&self) -> &Arc<Keystore> {
        &self.keystore
    }

    /// Returns the event log.
    #[must_use]
    pub fn event_log(&self) -> &Arc<EventLog> {
        &self.event_log
    }

    /// Returns the mirror.
    #[must_use]
    pub fn mirror(&self) -> &Arc<Mirror> {
        &self.mirror
    }

    /// Returns the receipt chain.
    #[must_use]
    pub fn receipt_chain(&self) -> &Arc<ReceiptChain> {
        &self.receipt_chain
    }

    /// Returns the adapter identity.
    #[must_use]
    pub fn adapter(&self) -> &ActorId {
        &self.adapter
    }

    /// Returns a snapshot of a proposal.
    #[must_use]
    pub fn proposal(&self, id: &str) -> Option<Proposal> {
        self.proposals.read().unwrap().get(id).cloned()
    }

    /// Captures a proposed action without verifying anything.
    ///
    /// Ensures the agent has a signing key, records the request in the
    /// mirror, appends a `SUGGESTION` event signed by the agent, and
    /// files the proposal as `pending`. Authority is asserted only at
    /// [`Self::commit`].
    ///
    /// # Errors
    ///
    /// Returns [`ProposeError`] if the capture cannot be hashed or the
    /// event cannot be appended; no proposal is filed in that case.
    pub fn propose(&self, action: ToolAction) -> Result<Proposal, ProposeError> {
        let _guard = self.op_lock.lock().unwrap();

        self.keystore.ensure_key(&self.agent);

        let prompt = canonical::to_string(&action)?;
        let entry = self.mirror.capture_request(&self.agent, &prompt, None)?;

        let proposed_action = serde_json::to_value(&action)
            .map_err(taugate_core::canonical::CanonicalError::from)?;
        let event_id = self.event_log.append(
            EventDraft::new(
                EventPayload::Suggestion {
                    mirror_ref: entry.id.clone(),
                    agent_id: self.agent.clone(),
                    proposed_action,
                    estimated_cost: action.estimated_cost,
                },
                self.agent.clone(),
            ),
            &self.keystore,
        )?;

        let proposal = Proposal {
            id: format!("proposal_{}", Uuid::now_v7()),
            action,
            mirror_ref: entry.id,
            event_id,
            status: ProposalStatus::Pending,
            created_at: Utc::now(),
        };
        info!(proposal_id = %proposal.id, tool = %proposal.action.tool, "filed proposal");
        self.proposals
            .write()
            .unwrap()
            .insert(proposal.id.clone(), proposal.clone());
        Ok(proposal)
    }

    /// Commits a pending proposal under a mandate, executing the tool if
    /// every gate passes.
    ///
    /// Gates run in order and short-circuit on the first failure: lookup,
    /// mandate verification, explicit revocation recheck, action scope,
    /// then any configured hooks. A gate failure marks the proposal
    /// `rejected` and appends a `PROPOSAL_REJECTED` event before the
    /// error returns.
    ///
    /// On success the event order is `COMMITTED` (signed by the
    /// delegate), then tool execution, then `RECEIPT_ISSUED` (signed by
    /// the issuer), with the signed receipt chained and returned.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError`] with a stable gate tag, an executor
    /// failure, or a fault from the underlying modules.
    #[allow(clippy::too_many_lines)]
    pub fn commit(&self, proposal_id: &str, mandate: &Mandate) -> Result<CommitOutcome, CommitError> {
        let _guard = self.op_lock.lock().unwrap();

        self.keystore.ensure_key(&self.adapter);

        let proposal = self
            .proposals
            .read()
            .unwrap()
            .get(proposal_id)
            .cloned()
            .ok_or(CommitError::ProposalNotFound)?;
        match proposal.status {
            ProposalStatus::Pending => {},
            ProposalStatus::Committed => return Err(CommitError::ProposalCommitted),
            ProposalStatus::Rejected => return Err(CommitError::ProposalRejected),
        }

        // Gate 1: signature and validity. The verify pass consults the
        // log too, but a purely-revoked mandate falls through to gate 2
        // so the rejection carries the REVOKED_MANDATE tag.
        let verification = mandate.verify(&self.keystore, Some(self.event_log.as_ref()));
        let blocking: Vec<String> = verification
            .errors
            .iter()
            .filter(|e| !e.starts_with("revoked"))
            .cloned()
            .collect();
        if !blocking.is_empty() {
            let detail = verification.errors.join("; ");
            self.reject(&proposal, "INVALID_MANDATE", verification.errors)?;
            return Err(CommitError::InvalidMandate(detail));
        }

        // Gate 2: explicit revocation recheck.
        if self.event_log.is_mandate_revoked(&mandate.mandate_id) {
            let detail = format!("mandate {} is revoked", mandate.mandate_id);
            self.reject(&proposal, "REVOKED_MANDATE", vec![detail.clone()])?;
            return Err(CommitError::RevokedMandate(detail));
        }

        // Gate 3: action scope.
        if !mandate.is_action_allowed(&proposal.action.tool) {
            let detail = format!("action '{}' is not in mandate scope", proposal.action.tool);
            self.reject(&proposal, "SCOPE_VIOLATION", vec![detail.clone()])?;
            return Err(CommitError::ScopeViolation(detail));
        }

        // Configured hooks (resource, budget, ...).
        for gate in &self.gates {
            if let Err(violation) = gate.check(mandate, &proposal.action) {
                let detail = format!("{}: {}", gate.name(), violation.reason);
                self.reject(&proposal, "SCOPE_VIOLATION", vec![detail.clone()])?;
                return Err(CommitError::ScopeViolation(detail));
            }
        }

        // Authorize: the COMMITTED event precedes execution so the
        // attempt is auditable even if the tool fails.
        self.keystore.ensure_key(&mandate.delegate);
        self.event_log.append(
            EventDraft::new(
                EventPayload::Committed {
                    proposal_id: proposal.id.clone(),
                    mandate_id: mandate.mandate_id.clone(),
                    action: proposal.action.tool.clone(),
                },
                mandate.delegate.clone(),
            ),
            &self.keystore,
        )?;

        let output = match self.executor.execute(&proposal.action) {
            Ok(output) => output,
            Err(err) => {
                warn!(proposal_id = %proposal.id, error = %err, "tool execution failed");
                self.event_log.append(
                    EventDraft::new(
                        EventPayload::ExecutionFailed {
                            proposal_id: proposal.id.clone(),
                            action: proposal.action.tool.clone(),
                            error: err.to_string(),
                        },
                        self.adapter.clone(),
                    ),
                    &self.keystore,
                )?;
                // The COMMITTED event is durable; the proposal cannot be
                // silently retried.
                self.set_status(&proposal.id, ProposalStatus::Committed);
                return Err(CommitError::Execution(err));
            },
        };

        let entry = self
            .mirror
            .capture_response(&proposal.mirror_ref, output.clone(), None)?;

        self.keystore.ensure_key(&mandate.issuer);
        let receipt = Receipt::issue(
            ReceiptParams {
                mandate_id: Some(mandate.mandate_id.clone()),
                actor: self.adapter.clone(),
                action: proposal.action.tool.clone(),
                request_hash: proposal.mirror_ref.clone(),
                response_hash: Some(canonical::hash(&output)?.to_hex()),
                provider_metadata: entry.provider_metadata,
                mirror_ref: proposal.mirror_ref.clone(),
            },
            &self.keystore,
        )?;
        self.receipt_chain
            .add(&receipt.receipt_id, &receipt.chain_data()?)?;

        self.event_log.append(
            EventDraft::new(
                EventPayload::ReceiptIssued {
                    receipt_id: receipt.receipt_id.clone(),
                    mandate_id: mandate.mandate_id.clone(),
                    proposal_id: proposal.id.clone(),
                },
                mandate.issuer.clone(),
            ),
            &self.keystore,
        )?;

        for gate in &self.gates {
            gate.on_committed(mandate, &proposal.action);
        }
        self.set_status(&proposal.id, ProposalStatus::Committed);
        info!(
            proposal_id = %proposal.id,
            receipt_id = %receipt.receipt_id,
            tool = %proposal.action.tool,
            "committed proposal"
        );
        Ok(CommitOutcome { output, receipt })
    }

    /// Verifies a mandate against the gate's keystore and event log,
    /// recording a `VERIFICATION_FAILED` event when invalid.
    ///
    /// # Errors
    ///
    /// Returns the event-log error if the failure event cannot be
    /// appended; the verification itself never errors.
    pub fn verify_mandate(
        &self,
        mandate: &Mandate,
    ) -> Result<MandateVerification, taugate_core::events::EventLogError> {
        let _guard = self.op_lock.lock().unwrap();

        self.keystore.ensure_key(&self.adapter);
        let verification = mandate.verify(&self.keystore, Some(self.event_log.as_ref()));
        if !verification.valid {
            self.event_log.append(
                EventDraft::new(
                    EventPayload::VerificationFailed {
                        mandate_id: mandate.mandate_id.clone(),
                        errors: verification.errors.clone(),
                    },
                    self.adapter.clone(),
                ),
                &self.keystore,
            )?;
        }
        Ok(verification)
    }

    /// Marks a proposal rejected and appends the `PROPOSAL_REJECTED`
    /// event.
    fn reject(
        &self,
        proposal: &Proposal,
        reason: &str,
        details: Vec<String>,
    ) -> Result<(), CommitError> {
        warn!(proposal_id = %proposal.id, reason, ?details, "rejected proposal");
        self.set_status(&proposal.id, ProposalStatus::Rejected);
        self.event_log.append(
            EventDraft::new(
                EventPayload::ProposalRejected {
                    proposal_id: proposal.id.clone(),
                    reason: reason.to_string(),
                    details,
                },
                self.adapter.clone(),
            ),
            &self.keystore,
        )?;
        Ok(())
    }

    fn set_status(&self, proposal_id: &str, status: ProposalStatus) {
        if let Some(proposal) = self.proposals.write().unwrap().get_mut(proposal_id) {
            proposal.status = status;
        }
    }
}
