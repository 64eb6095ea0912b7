//! The append-only event log.
//!
//! Lock poisoning indicates a panic in another thread, which is
//! unrecoverable.

#![allow(clippy::missing_panics_doc)]

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::types::{Event, EventDraft, EventKind, EventPayload};
use crate::actor::ActorId;
use crate::canonical::CanonicalError;
use crate::crypto::{Keystore, KeystoreError};

/// Errors produced by event log operations.
///
/// Appending fails only on canonicalization errors or a missing signer
/// key; everything else in the log is infallible by construction.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EventLogError {
    /// The event could not be canonicalized for signing or hashing.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),

    /// The signer's key was missing or unusable.
    #[error(transparent)]
    Keystore(#[from] KeystoreError),
}

/// Filter for [`EventLog::query`].
///
/// All criteria are conjunctive; the limit applies after filtering.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Match only events of this kind.
    pub kind: Option<EventKind>,
    /// Match only events signed by this actor.
    pub signer: Option<ActorId>,
    /// Match only events at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Keep at most this many events, from the front of the filtered set.
    pub limit: Option<usize>,
}

impl EventFilter {
    /// A filter matching events of one kind.
    #[must_use]
    pub fn kind(kind: EventKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Restricts the filter to one signer.
    #[must_use]
    pub fn signed_by(mut self, signer: ActorId) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Restricts the filter to events at or after an instant.
    #[must_use]
    pub const fn since(mut self, instant: DateTime<Utc>) -> Self {
        self.since = Some(instant);
        self
    }

    /// Caps the number of returned events.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, event: &Event) -> bool {
        if let Some(kind) = self.kind {
            if event.kind() != kind {
                return false;
            }
        }
        if let Some(signer) = &self.signer {
            if &event.signer != signer {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.timestamp < since {
                return false;
            }
        }
        true
    }
}

/// Result of a full chain verification.
///
/// Verification never fails part-way; it walks the whole sequence and
/// accumulates every problem it finds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainVerification {
    /// `true` iff no errors were found.
    pub valid: bool,
    /// Human-readable descriptions of each violation.
    pub errors: Vec<String>,
    /// How many events the walk covered.
    pub events_verified: usize,
}

/// Append-only, hash-chained sequence of signed events.
///
/// Writers are exclusive; readers observe a consistent snapshot. The
/// chain is a pure function of the stored sequence — verification uses no
/// state outside the log and the signers' public keys.
pub struct EventLog {
    events: RwLock<Vec<Event>>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    /// Appends a signed event built from the draft.
    ///
    /// Assigns a fresh time-sortable id, stamps the current time, links
    /// `prev_hash` to the current tail, signs the canonical form (minus
    /// the signature field) with the signer's key, and pushes. Returns
    /// the new event's id.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError`] on canonicalization failure or when the
    /// signer has no private key. Nothing is appended on error.
    pub fn append(&self, draft: EventDraft, keystore: &Keystore) -> Result<String, EventLogError> {
        let mut events = self.events.write().unwrap();

        let prev_hash = match events.last() {
            Some(prev) => Some(prev.content_hash()?),
            None => None,
        };

        let mut event = Event {
            id: format!("evt_{}", Uuid::now_v7()),
            timestamp: Utc::now(),
            payload: draft.payload,
            signer: draft.signer,
            signature: String::new(),
            prev_hash,
        };

        let signing_bytes = event.signing_bytes()?;
        event.signature = keystore.sign(&signing_bytes, &event.signer.key_id())?;

        let id = event.id.clone();
        info!(event_id = %id, kind = %event.kind(), signer = %event.signer, "appended event");
        events.push(event);
        Ok(id)
    }

    /// Returns a snapshot of the events matching the filter.
    #[must_use]
    pub fn query(&self, filter: &EventFilter) -> Vec<Event> {
        let events = self.events.read().unwrap();
        let iter = events.iter().filter(|e| filter.matches(e)).cloned();
        let matched: Vec<Event> = match filter.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        };
        debug!(matched = matched.len(), "event query");
        matched
    }

    /// Returns the event with the given id, if present.
    #[must_use]
    pub fn event(&self, id: &str) -> Option<Event> {
        self.events
            .read()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// Returns the most recently appended event.
    #[must_use]
    pub fn latest(&self) -> Option<Event> {
        self.events.read().unwrap().last().cloned()
    }

    /// Returns the number of events in the log.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().unwrap().len()
    }

    /// Returns `true` if the log holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().unwrap().is_empty()
    }

    /// Returns a copy of the full sequence, in insertion order.
    #[must_use]
    pub fn export(&self) -> Vec<Event> {
        self.events.read().unwrap().clone()
    }

    /// Replaces the entire sequence with an imported one.
    ///
    /// Trust is not re-established by import: callers must run
    /// [`Self::verify_chain`] afterwards.
    pub fn import(&self, events: Vec<Event>) {
        let mut guard = self.events.write().unwrap();
        info!(imported = events.len(), replaced = guard.len(), "imported event log");
        *guard = events;
    }

    /// Returns `true` iff any `MANDATE_REVOKE` event names the mandate id.
    #[must_use]
    pub fn is_mandate_revoked(&self, mandate_id: &str) -> bool {
        self.events.read().unwrap().iter().any(|e| {
            matches!(
                &e.payload,
                EventPayload::MandateRevoke { mandate_id: revoked, .. } if revoked == mandate_id
            )
        })
    }

    /// Verifies hash-chain continuity and every event signature.
    ///
    /// For each event: the stored `prev_hash` must equal the canonical
    /// hash of the entire previous event, and the signature must verify
    /// over the canonical form minus the signature field under the
    /// signer's public key. Accumulates all errors; never fails early.
    #[must_use]
    pub fn verify_chain(&self, keystore: &Keystore) -> ChainVerification {
        let events = self.events.read().unwrap();
        let mut errors = Vec::new();

        for (i, event) in events.iter().enumerate() {
            if i == 0 {
                if event.prev_hash.is_some() {
                    errors.push("event 0: unexpected prev_hash on first event".to_string());
                }
            } else {
                match events[i - 1].content_hash() {
                    Ok(expected) => match &event.prev_hash {
                        Some(actual) if actual.ct_eq(&expected) => {},
                        Some(actual) => errors.push(format!(
                            "event {i}: prev_hash mismatch (expected {expected}, found {actual})"
                        )),
                        None => errors.push(format!("event {i}: missing prev_hash")),
                    },
                    Err(e) => {
                        errors.push(format!("event {i}: failed to hash previous event: {e}"));
                    },
                }
            }

            match event.signing_bytes() {
                Ok(bytes) => {
                    let key_id = event.signer.key_id();
                    match keystore.get_public_key(&key_id) {
                        Ok(public_key) => {
                            if !Keystore::verify(&event.signature, &bytes, &public_key) {
                                errors.push(format!(
                                    "event {i}: signature verification failed for signer {}",
                                    event.signer
                                ));
                            }
                        },
                        Err(_) => errors.push(format!("event {i}: unknown signer key {key_id}")),
                    }
                },
                Err(e) => errors.push(format!("event {i}: failed to canonicalize: {e}")),
            }
        }

        ChainVerification {
            valid: errors.is_empty(),
            errors,
            events_verified: events.len(),
        }
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
