//! Integration tests for the full propose/commit lifecycle.
//!
//! These tests drive the gate end-to-end and verify:
//! - Happy path: gates pass, the tool runs once, a receipt is chained
//! - Rejections: expired, revoked, and out-of-scope mandates
//! - Audit trail: event ordering, chain verification, tamper detection
//! - Idempotency: terminal proposals keep failing with stable tags
//! - Budget and resource hooks

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Duration, Utc};
use taugate_core::actor::ActorId;
use taugate_core::canonical;
use taugate_core::events::{EventFilter, EventKind, EventLog, EventPayload};
use taugate_core::mandate::{Mandate, Scope, revoke_mandate};
use taugate_kernel::{
    BudgetGate, CommitError, ProposalStatus, ResourceGate, TauGate, ToolAction, ToolExecutor,
    ToolExecutorError,
};

// ============================================================================
// Test executors
// ============================================================================

/// Counts invocations and returns a fixed output.
struct CountingExecutor {
    calls: Arc<AtomicUsize>,
}

impl ToolExecutor for CountingExecutor {
    fn execute(&self, action: &ToolAction) -> Result<serde_json::Value, ToolExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::json!({"status": "ok", "tool": action.tool}))
    }
}

/// Always fails, as a crashed back-end would.
struct FailingExecutor;

impl ToolExecutor for FailingExecutor {
    fn execute(&self, _action: &ToolAction) -> Result<serde_json::Value, ToolExecutorError> {
        Err(ToolExecutorError::new("backend unavailable"))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn agent() -> ActorId {
    ActorId::parse("agent:planner").unwrap()
}

fn adapter() -> ActorId {
    ActorId::parse("adapter:gate").unwrap()
}

fn alice() -> ActorId {
    ActorId::parse("user:alice").unwrap()
}

fn counting_gate() -> (TauGate, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = TauGate::new(
        agent(),
        adapter(),
        Box::new(CountingExecutor {
            calls: Arc::clone(&calls),
        }),
    );
    (gate, calls)
}

/// Issues and signs a mandate from alice to the gate's agent.
fn mandate_for(gate: &TauGate, scope: Scope) -> Mandate {
    let key_id = gate.keystore().ensure_key(&alice());
    Mandate::builder(alice(), agent())
        .scope(scope)
        .build()
        .unwrap()
        .sign(gate.keystore(), &key_id)
        .unwrap()
}

fn kinds(log: &EventLog) -> Vec<EventKind> {
    log.export().iter().map(|e| e.kind()).collect()
}

// ============================================================================
// Happy path
// ============================================================================

#[test]
fn full_happy_path() {
    let (gate, calls) = counting_gate();
    let mandate = mandate_for(
        &gate,
        Scope::new(["invoke:model"], ["agent:openai"]).with_max_value(1000),
    );
    assert!(
        mandate
            .verify(gate.keystore(), Some(gate.event_log().as_ref()))
            .valid
    );

    let proposal = gate
        .propose(ToolAction::new(
            "invoke:model",
            serde_json::json!({"prompt": "hello"}),
        ))
        .unwrap();
    assert_eq!(proposal.status, ProposalStatus::Pending);

    let outcome = gate.commit(&proposal.id, &mandate).unwrap();

    // The executor ran exactly once and its output came back verbatim.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.output["status"], "ok");

    // The receipt binds the execution to the mandate and verifies.
    let receipt = &outcome.receipt;
    outcome.receipt.verify(gate.keystore()).unwrap();
    assert_eq!(receipt.mandate_id.as_deref(), Some(mandate.mandate_id.as_str()));
    assert_eq!(receipt.actor, adapter());
    assert_eq!(receipt.action, "invoke:model");
    assert_eq!(receipt.request_hash, proposal.mirror_ref);
    assert_eq!(receipt.mirror_ref, proposal.mirror_ref);
    assert_eq!(
        receipt.response_hash.as_deref(),
        Some(canonical::hash(&outcome.output).unwrap().to_hex().as_str())
    );

    // Event order: SUGGESTION < COMMITTED < RECEIPT_ISSUED, nothing else.
    assert_eq!(
        kinds(gate.event_log()),
        vec![
            EventKind::Suggestion,
            EventKind::Committed,
            EventKind::ReceiptIssued
        ]
    );
    let events = gate.event_log().export();
    assert_eq!(events[0].signer, agent());
    assert_eq!(events[1].signer, mandate.delegate);
    assert_eq!(events[2].signer, mandate.issuer);

    // The whole chain verifies.
    let verification = gate.event_log().verify_chain(gate.keystore());
    assert!(verification.valid, "errors: {:?}", verification.errors);
    assert_eq!(verification.events_verified, 3);

    // The receipt chain holds exactly this receipt.
    assert!(gate.receipt_chain().verify_chain());
    let proof = gate.receipt_chain().proof();
    assert_eq!(proof.chain_length, 1);
    assert!(gate
        .receipt_chain()
        .verify(&receipt.receipt_id, &receipt.chain_data().unwrap())
        .unwrap());

    // The proposal is terminal.
    assert_eq!(
        gate.proposal(&proposal.id).unwrap().status,
        ProposalStatus::Committed
    );
}

#[test]
fn mirror_entry_is_finalized_on_commit() {
    let (gate, _calls) = counting_gate();
    let mandate = mandate_for(&gate, Scope::new(["invoke:model"], ["*"]));

    let proposal = gate
        .propose(ToolAction::new("invoke:model", serde_json::json!({"n": 1})))
        .unwrap();
    let before = gate.mirror().entry(&proposal.mirror_ref).unwrap();
    assert!(before.response.is_none());

    let outcome = gate.commit(&proposal.id, &mandate).unwrap();
    let after = gate.mirror().entry(&proposal.mirror_ref).unwrap();
    assert_eq!(after.response, Some(outcome.output));
    assert!(after.response_hash.is_some());
}

// ============================================================================
// Gate rejections
// ============================================================================

#[test]
fn expired_mandate_is_rejected_as_invalid() {
    let (gate, calls) = counting_gate();
    let key_id = gate.keystore().ensure_key(&alice());
    let mandate = Mandate::builder(alice(), agent())
        .scope(Scope::new(["invoke:model"], ["*"]))
        .not_after(Utc::now() - Duration::seconds(1))
        .build()
        .unwrap()
        .sign(gate.keystore(), &key_id)
        .unwrap();

    let verification = mandate.verify(gate.keystore(), Some(gate.event_log().as_ref()));
    assert!(verification.errors.iter().any(|e| e.contains("expired")));

    let proposal = gate
        .propose(ToolAction::new("invoke:model", serde_json::json!({})))
        .unwrap();
    let err = gate.commit(&proposal.id, &mandate).unwrap_err();
    assert!(matches!(err, CommitError::InvalidMandate(_)));
    assert!(err.to_string().starts_with("INVALID_MANDATE:"));
    assert!(err.to_string().contains("expired"));

    // Exactly one PROPOSAL_REJECTED, no COMMITTED, no execution.
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let rejected = gate
        .event_log()
        .query(&EventFilter::kind(EventKind::ProposalRejected));
    assert_eq!(rejected.len(), 1);
    assert!(gate
        .event_log()
        .query(&EventFilter::kind(EventKind::Committed))
        .is_empty());
    assert_eq!(
        gate.proposal(&proposal.id).unwrap().status,
        ProposalStatus::Rejected
    );

    // The rejection event carries the tag and the verify details.
    match &rejected[0].payload {
        EventPayload::ProposalRejected { reason, details, .. } => {
            assert_eq!(reason, "INVALID_MANDATE");
            assert!(details.iter().any(|d| d.contains("expired")));
        },
        other => panic!("expected ProposalRejected, got {other:?}"),
    }
}

#[test]
fn revocation_mid_flight_is_rejected_as_revoked() {
    let (gate, calls) = counting_gate();
    let mandate = mandate_for(&gate, Scope::new(["invoke:model"], ["*"]));

    let proposal = gate
        .propose(ToolAction::new("invoke:model", serde_json::json!({})))
        .unwrap();

    // Revoked between propose and commit.
    revoke_mandate(
        &mandate.mandate_id,
        "user withdrew consent",
        &alice(),
        gate.keystore(),
        gate.event_log(),
    )
    .unwrap();

    let err = gate.commit(&proposal.id, &mandate).unwrap_err();
    assert!(matches!(err, CommitError::RevokedMandate(_)));
    assert!(err.to_string().starts_with("REVOKED_MANDATE:"));

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        gate.proposal(&proposal.id).unwrap().status,
        ProposalStatus::Rejected
    );
}

#[test]
fn out_of_scope_action_is_rejected_before_execution() {
    let (gate, calls) = counting_gate();
    let mandate = mandate_for(&gate, Scope::new(["read_file"], ["*"]));

    let proposal = gate
        .propose(ToolAction::new(
            "write_file",
            serde_json::json!({"path": "/tmp/x"}),
        ))
        .unwrap();
    let err = gate.commit(&proposal.id, &mandate).unwrap_err();
    assert!(matches!(err, CommitError::ScopeViolation(_)));
    assert!(err.to_string().starts_with("SCOPE_VIOLATION:"));
    assert!(err.to_string().contains("write_file"));

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(gate
        .event_log()
        .query(&EventFilter::kind(EventKind::Committed))
        .is_empty());
}

// ============================================================================
// Terminal proposals and unknown ids
// ============================================================================

#[test]
fn commit_outcomes_are_idempotent() {
    let (gate, _calls) = counting_gate();
    let mandate = mandate_for(&gate, Scope::new(["invoke:model"], ["*"]));

    assert!(matches!(
        gate.commit("proposal_missing", &mandate),
        Err(CommitError::ProposalNotFound)
    ));

    // Post-success commits keep failing with PROPOSAL_COMMITTED.
    let committed = gate
        .propose(ToolAction::new("invoke:model", serde_json::json!({})))
        .unwrap();
    gate.commit(&committed.id, &mandate).unwrap();
    for _ in 0..2 {
        assert!(matches!(
            gate.commit(&committed.id, &mandate),
            Err(CommitError::ProposalCommitted)
        ));
    }

    // Post-rejection commits keep failing with PROPOSAL_REJECTED.
    let rejected = gate
        .propose(ToolAction::new("forbidden_tool", serde_json::json!({})))
        .unwrap();
    assert!(matches!(
        gate.commit(&rejected.id, &mandate),
        Err(CommitError::ScopeViolation(_))
    ));
    for _ in 0..2 {
        assert!(matches!(
            gate.commit(&rejected.id, &mandate),
            Err(CommitError::ProposalRejected)
        ));
    }
}

// ============================================================================
// Executor failure
// ============================================================================

#[test]
fn executor_failure_leaves_an_auditable_attempt() {
    let gate = TauGate::new(agent(), adapter(), Box::new(FailingExecutor));
    let mandate = mandate_for(&gate, Scope::new(["invoke:model"], ["*"]));

    let proposal = gate
        .propose(ToolAction::new("invoke:model", serde_json::json!({})))
        .unwrap();
    let err = gate.commit(&proposal.id, &mandate).unwrap_err();
    assert!(matches!(err, CommitError::Execution(_)));
    assert!(err.to_string().contains("backend unavailable"));

    // COMMITTED stands, EXECUTION_FAILED follows, no receipt exists.
    assert_eq!(
        kinds(gate.event_log()),
        vec![
            EventKind::Suggestion,
            EventKind::Committed,
            EventKind::ExecutionFailed
        ]
    );
    assert!(gate.receipt_chain().is_empty());

    // The attempt is terminal: re-commit reports PROPOSAL_COMMITTED.
    assert!(matches!(
        gate.commit(&proposal.id, &mandate),
        Err(CommitError::ProposalCommitted)
    ));

    // The failure event is signed by the adapter and chain-verifies.
    let events = gate.event_log().export();
    assert_eq!(events[2].signer, adapter());
    assert!(gate.event_log().verify_chain(gate.keystore()).valid);
}

// ============================================================================
// Tamper detection
// ============================================================================

#[test]
fn tampered_event_breaks_chain_verification() {
    let (gate, _calls) = counting_gate();
    let mandate = mandate_for(&gate, Scope::new(["invoke:model"], ["*"]));

    // Build a 4-event chain: SUGGESTION, COMMITTED, RECEIPT_ISSUED,
    // MANDATE_REVOKE.
    let proposal = gate
        .propose(ToolAction::new("invoke:model", serde_json::json!({})))
        .unwrap();
    gate.commit(&proposal.id, &mandate).unwrap();
    revoke_mandate(
        &mandate.mandate_id,
        "done",
        &alice(),
        gate.keystore(),
        gate.event_log(),
    )
    .unwrap();
    assert_eq!(gate.event_log().len(), 4);
    assert!(gate.event_log().verify_chain(gate.keystore()).valid);

    // Mutate event 2's payload, keeping its original signature.
    let mut events = gate.event_log().export();
    if let EventPayload::ReceiptIssued { receipt_id, .. } = &mut events[2].payload {
        *receipt_id = "forged-receipt".to_string();
    } else {
        panic!("expected RECEIPT_ISSUED at index 2");
    }
    gate.event_log().import(events);

    let verification = gate.event_log().verify_chain(gate.keystore());
    assert!(!verification.valid);
    assert!(
        verification.errors.iter().any(|e| e.starts_with("event 2")
            || (e.starts_with("event 3") && e.contains("prev_hash"))),
        "errors: {:?}",
        verification.errors
    );
}

#[test]
fn exported_log_reimports_and_still_verifies() {
    let (gate, _calls) = counting_gate();
    let mandate = mandate_for(&gate, Scope::new(["invoke:model"], ["*"]));
    let proposal = gate
        .propose(ToolAction::new("invoke:model", serde_json::json!({})))
        .unwrap();
    gate.commit(&proposal.id, &mandate).unwrap();

    let json = serde_json::to_string(&gate.event_log().export()).unwrap();
    let restored = serde_json::from_str(&json).unwrap();
    let fresh = EventLog::new();
    fresh.import(restored);

    let verification = fresh.verify_chain(gate.keystore());
    assert!(verification.valid, "errors: {:?}", verification.errors);
    assert_eq!(verification.events_verified, 3);
}

// ============================================================================
// Wildcard scopes
// ============================================================================

#[test]
fn wildcard_scope_matching() {
    let (gate, _calls) = counting_gate();
    let mandate = mandate_for(&gate, Scope::new(["payment:*"], ["*"]));

    assert!(mandate.is_action_allowed("payment:transfer"));
    assert!(mandate.is_action_allowed("payment:refund"));
    assert!(!mandate.is_action_allowed("payments:x"));

    let transfer = gate
        .propose(ToolAction::new(
            "payment:transfer",
            serde_json::json!({"amount": 10}),
        ))
        .unwrap();
    gate.commit(&transfer.id, &mandate).unwrap();

    let outside = gate
        .propose(ToolAction::new("payments:x", serde_json::json!({})))
        .unwrap();
    assert!(matches!(
        gate.commit(&outside.id, &mandate),
        Err(CommitError::ScopeViolation(_))
    ));
}

// ============================================================================
// Budget and resource hooks
// ============================================================================

#[test]
fn budget_predicate_edges() {
    let (gate, _calls) = counting_gate();
    let bounded = mandate_for(&gate, Scope::new(["*"], ["*"]).with_max_value(10_000));
    assert!(bounded.is_within_budget(10_000));
    assert!(!bounded.is_within_budget(10_001));

    let unbounded = mandate_for(&gate, Scope::new(["*"], ["*"]));
    assert!(unbounded.is_within_budget(u64::MAX));
}

#[test]
fn budget_gate_tracks_spend_across_commits() {
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = TauGate::new(
        agent(),
        adapter(),
        Box::new(CountingExecutor {
            calls: Arc::clone(&calls),
        }),
    )
    .with_gate(Box::new(BudgetGate::new()));
    let mandate = mandate_for(&gate, Scope::new(["payment:*"], ["*"]).with_max_value(10_000));

    // The whole ceiling fits in one commit.
    let first = gate
        .propose(
            ToolAction::new("payment:transfer", serde_json::json!({"amount": 10_000}))
                .with_estimated_cost(10_000),
        )
        .unwrap();
    gate.commit(&first.id, &mandate).unwrap();

    // The budget is exhausted; the next positive spend is vetoed.
    let second = gate
        .propose(
            ToolAction::new("payment:transfer", serde_json::json!({"amount": 1}))
                .with_estimated_cost(1),
        )
        .unwrap();
    let err = gate.commit(&second.id, &mandate).unwrap_err();
    assert!(matches!(err, CommitError::ScopeViolation(_)));
    assert!(err.to_string().contains("budget"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn rejected_commits_consume_no_budget() {
    let gate = TauGate::new(agent(), adapter(), Box::new(FailingExecutor))
        .with_gate(Box::new(BudgetGate::new()));
    let mandate = mandate_for(&gate, Scope::new(["pay"], ["*"]).with_max_value(100));

    // Out-of-scope commit: vetoed before the budget moves.
    let outside = gate
        .propose(ToolAction::new("other", serde_json::json!({})).with_estimated_cost(100))
        .unwrap();
    assert!(gate.commit(&outside.id, &mandate).is_err());

    // The full ceiling is still available for the budget check.
    let attempt = gate
        .propose(ToolAction::new("pay", serde_json::json!({})).with_estimated_cost(100))
        .unwrap();
    let err = gate.commit(&attempt.id, &mandate).unwrap_err();
    // The budget gate passed; only the executor failed.
    assert!(matches!(err, CommitError::Execution(_)));
}

#[test]
fn resource_gate_vetoes_under_scope_violation_tag() {
    let (gate, calls) = counting_gate();
    let gate = gate.with_gate(Box::new(ResourceGate));
    let mandate = mandate_for(&gate, Scope::new(["invoke:model"], ["agent:openai"]));

    let allowed = gate
        .propose(
            ToolAction::new("invoke:model", serde_json::json!({}))
                .with_resource("agent:openai"),
        )
        .unwrap();
    gate.commit(&allowed.id, &mandate).unwrap();

    let denied = gate
        .propose(
            ToolAction::new("invoke:model", serde_json::json!({}))
                .with_resource("agent:other"),
        )
        .unwrap();
    let err = gate.commit(&denied.id, &mandate).unwrap_err();
    assert!(err.to_string().starts_with("SCOPE_VIOLATION:"));
    assert!(err.to_string().contains("resource"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Standalone verification entry point
// ============================================================================

#[test]
fn verify_mandate_records_verification_failed() {
    let (gate, _calls) = counting_gate();
    let key_id = gate.keystore().ensure_key(&alice());
    let expired = Mandate::builder(alice(), agent())
        .scope(Scope::new(["*"], ["*"]))
        .not_after(Utc::now() - Duration::seconds(1))
        .build()
        .unwrap()
        .sign(gate.keystore(), &key_id)
        .unwrap();

    let verification = gate.verify_mandate(&expired).unwrap();
    assert!(!verification.valid);

    let events = gate
        .event_log()
        .query(&EventFilter::kind(EventKind::VerificationFailed));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].signer, adapter());

    // A valid mandate leaves no trace.
    let valid = mandate_for(&gate, Scope::new(["*"], ["*"]));
    assert!(gate.verify_mandate(&valid).unwrap().valid);
    assert_eq!(gate.event_log().len(), 1);
}
