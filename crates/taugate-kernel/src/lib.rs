//! # taugate-kernel
//!
//! The taugate sovereignty gate: a two-phase propose/commit state machine
//! that interposes on external tool executions. No action runs on a
//! user's behalf unless a signed, in-scope, unrevoked mandate authorizes
//! it, and every executed action produces a signed, chain-linked receipt.
//!
//! The primitives — canonical form, keystore, event log, mandates,
//! receipts, mirror — live in [`taugate_core`]; this crate wires them
//! into the enforcing [`TauGate`].
//!
//! ## Example
//!
//! ```rust
//! use taugate_core::actor::ActorId;
//! use taugate_core::mandate::{Mandate, Scope};
//! use taugate_kernel::{TauGate, ToolAction, ToolExecutorError};
//!
//! fn run_tool(_action: &ToolAction) -> Result<serde_json::Value, ToolExecutorError> {
//!     Ok(serde_json::json!({"status": "done"}))
//! }
//!
//! let agent = ActorId::parse("agent:planner").unwrap();
//! let adapter = ActorId::parse("adapter:gate").unwrap();
//! let gate = TauGate::new(agent, adapter, Box::new(run_tool));
//!
//! // The mandate is issued and signed out-of-band by the user.
//! let alice = ActorId::parse("user:alice").unwrap();
//! let key_id = gate.keystore().ensure_key(&alice);
//! let mandate = Mandate::builder(alice, ActorId::parse("agent:planner").unwrap())
//!     .scope(Scope::new(["invoke:model"], ["*"]))
//!     .build()
//!     .unwrap()
//!     .sign(gate.keystore(), &key_id)
//!     .unwrap();
//!
//! let proposal = gate
//!     .propose(ToolAction::new("invoke:model", serde_json::json!({"prompt": "hi"})))
//!     .unwrap();
//! let outcome = gate.commit(&proposal.id, &mandate).unwrap();
//! assert_eq!(outcome.output["status"], "done");
//! ```

#![warn(missing_docs)]

pub mod budget;
pub mod error;
pub mod executor;
pub mod gate;
pub mod proposal;

pub use budget::{BudgetBook, BudgetGate, CommitGate, GateViolation, ResourceGate};
pub use error::{CommitError, ProposeError};
pub use executor::{ToolAction, ToolExecutor, ToolExecutorError};
pub use gate::{CommitOutcome, TauGate};
pub use proposal::{Proposal, ProposalStatus};
