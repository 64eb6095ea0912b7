//! Append-only, hash-chained, per-event-signed lifecycle log.
//!
//! Every fact the kernel acts on — mandate creation and revocation, action
//! suggestions, commits, receipts, rejections, failures — is recorded as a
//! signed [`Event`] in the [`EventLog`]. Events link through `prev_hash`
//! (the canonical SHA-256 of the entire previous event, signature
//! included), so any mutation of history breaks the chain.
//!
//! # Signing
//!
//! Each event is signed by its `signer` over the canonical form of the
//! event with the `signature` field removed; `id`, `timestamp`, and
//! `prev_hash` are all covered. Verification therefore needs nothing
//! beyond the stored sequence and the signers' public keys.
//!
//! # Authoritative Revocation
//!
//! A mandate counts as revoked exactly when the log contains a
//! `MANDATE_REVOKE` event for its id — see
//! [`EventLog::is_mandate_revoked`]. The legacy revocation hash chain
//! ([`crate::revocation`]) never influences this answer.

mod log;
mod types;

pub use log::{ChainVerification, EventFilter, EventLog, EventLogError};
pub use types::{Event, EventDraft, EventKind, EventPayload};
