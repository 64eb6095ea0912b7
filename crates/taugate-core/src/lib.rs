//! # taugate-core
//!
//! Core primitives for the taugate sovereignty kernel: the pieces that
//! make tool executions attributable, authorized, and auditable.
//!
//! - **Canonical form** ([`canonical`]): deterministic JCS bytes and
//!   SHA-256 content hashes — the wire contract every signature and chain
//!   link depends on.
//! - **Actors & keys** ([`actor`], [`crypto`]): `role:name` principals,
//!   per-actor Ed25519 keypairs, DID-key identity.
//! - **Event log** ([`events`]): append-only, hash-chained, per-event
//!   signed record of every lifecycle fact.
//! - **Mandates** ([`mandate`]): signed, scoped, time-bounded authority
//!   from an issuer to a delegate, revocable through the log.
//! - **Receipts** ([`receipt`]): signed execution evidence plus a second
//!   hash chain verifiable from receipt data alone.
//! - **Mirror** ([`mirror`]): request/response capture referenced by
//!   receipts.
//! - **Revocation chain** ([`revocation`]): legacy head-of-chain
//!   structure, addressable but not authoritative.
//!
//! The enforcement state machine that ties these together lives in the
//! `taugate-kernel` crate.
//!
//! ## Example
//!
//! ```rust
//! use taugate_core::actor::ActorId;
//! use taugate_core::crypto::Keystore;
//! use taugate_core::events::EventLog;
//! use taugate_core::mandate::{Mandate, Scope, revoke_mandate};
//!
//! let keystore = Keystore::new();
//! let log = EventLog::new();
//! let alice = ActorId::parse("user:alice").unwrap();
//! let agent = ActorId::parse("agent:planner").unwrap();
//! let key_id = keystore.ensure_key(&alice);
//!
//! let mandate = Mandate::builder(alice.clone(), agent)
//!     .scope(Scope::new(["payment:*"], ["*"]).with_max_value(10_000))
//!     .build()
//!     .unwrap()
//!     .sign(&keystore, &key_id)
//!     .unwrap();
//!
//! assert!(mandate.verify(&keystore, Some(&log)).valid);
//!
//! revoke_mandate(&mandate.mandate_id, "user request", &alice, &keystore, &log).unwrap();
//! assert!(!mandate.verify(&keystore, Some(&log)).valid);
//! ```

#![warn(missing_docs)]

pub mod actor;
pub mod canonical;
pub mod crypto;
pub mod events;
pub mod mandate;
pub mod mirror;
pub mod receipt;
pub mod revocation;

pub use actor::{ActorId, ActorRole, KeyId};
pub use canonical::ContentHash;
pub use crypto::Keystore;
pub use events::{Event, EventDraft, EventKind, EventLog, EventPayload};
pub use mandate::{Mandate, MandateVerification, Scope};
pub use mirror::{Mirror, MirrorEntry};
pub use receipt::{Receipt, ReceiptChain};
pub use revocation::RevocationChain;
