//! Mandate lifecycle: create, sign, verify, revoke, scope-check.
//!
//! A mandate is a signed, scoped, time-bounded authorization from an
//! issuer (a user) to a delegate (an agent). Mandates are built unsigned,
//! signed immediately, and immutable afterwards; revocation happens by
//! appending a `MANDATE_REVOKE` event to the log, never by mutating the
//! mandate.
//!
//! # Signed Bytes
//!
//! The signature covers exactly the canonical JSON of the mandate with the
//! `signature` key **removed** — not emptied. Any other encoding breaks
//! verification across implementations.
//!
//! # Verification
//!
//! [`Mandate::verify`] accumulates every failure rather than stopping at
//! the first: validity window, revocation status (when a log is supplied),
//! issuer key presence, and signature. A mandate is valid iff the error
//! list comes back empty. Check order is fixed for observability; it does
//! not affect the boolean outcome.
//!
//! # Example
//!
//! ```rust
//! use taugate_core::actor::ActorId;
//! use taugate_core::crypto::Keystore;
//! use taugate_core::mandate::{Mandate, Scope};
//!
//! let keystore = Keystore::new();
//! let issuer = ActorId::parse("user:alice").unwrap();
//! let delegate = ActorId::parse("agent:planner").unwrap();
//! let key_id = keystore.ensure_key(&issuer);
//!
//! let mandate = Mandate::builder(issuer, delegate)
//!     .scope(Scope::new(["invoke:model"], ["agent:openai"]).with_max_value(1000))
//!     .build()
//!     .unwrap()
//!     .sign(&keystore, &key_id)
//!     .unwrap();
//!
//! let verification = mandate.verify(&keystore, None);
//! assert!(verification.valid);
//! ```

mod scope;

pub use scope::Scope;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::actor::{ActorId, KeyId};
use crate::canonical::{self, CanonicalError};
use crate::crypto::{Keystore, KeystoreError};
use crate::events::{EventDraft, EventLog, EventLogError, EventPayload};

/// Errors produced while building or signing a mandate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MandateError {
    /// The currency code is not three ASCII uppercase letters.
    #[error("invalid currency code: '{code}' is not an ISO-4217 code")]
    InvalidCurrency {
        /// The offending code.
        code: String,
    },

    /// The validity window is inverted.
    #[error("invalid validity window: not_before is after not_after")]
    InvertedValidity,

    /// The mandate could not be canonicalized.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),

    /// Signing failed in the keystore.
    #[error(transparent)]
    Keystore(#[from] KeystoreError),
}

/// Time bounds on a mandate's validity. Both ends are optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Validity {
    /// The mandate is invalid before this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,

    /// The mandate is invalid after this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_after: Option<DateTime<Utc>>,
}

/// Result of mandate verification: valid iff `errors` is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MandateVerification {
    /// `true` iff no check failed.
    pub valid: bool,
    /// Every failed check, in check order.
    pub errors: Vec<String>,
}

/// A signed, scoped, time-bounded authorization from issuer to delegate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mandate {
    /// Time-sortable unique id (UUID v7, lower-case).
    pub mandate_id: String,

    /// The actor granting authority.
    pub issuer: ActorId,

    /// The actor receiving authority.
    pub delegate: ActorId,

    /// What the delegate is permitted to do.
    pub scope: Scope,

    /// When the mandate is in force.
    pub validity: Validity,

    /// Opaque key/value constraints, forwarded but never interpreted by
    /// the kernel.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub constraints: BTreeMap<String, serde_json::Value>,

    /// When the mandate was created.
    pub created_at: DateTime<Utc>,

    /// Detached Ed25519 signature (128 hex chars); empty until signed.
    pub signature: String,
}

impl Mandate {
    /// Returns a builder for an unsigned mandate.
    #[must_use]
    pub fn builder(issuer: ActorId, delegate: ActorId) -> MandateBuilder {
        MandateBuilder {
            issuer,
            delegate,
            scope: Scope::new(Vec::<String>::new(), Vec::<String>::new()),
            validity: Validity::default(),
            constraints: BTreeMap::new(),
        }
    }

    /// Returns the canonical bytes the signature covers: the mandate with
    /// the `signature` key removed.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError`] if canonicalization fails.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CanonicalError> {
        let mut value = serde_json::to_value(self)?;
        if let Some(object) = value.as_object_mut() {
            object.remove("signature");
        }
        canonical::to_bytes(&value)
    }

    /// Signs the mandate with the given key, consuming the unsigned form.
    ///
    /// # Errors
    ///
    /// Returns [`MandateError`] on canonicalization failure or when the
    /// key has no private component.
    pub fn sign(mut self, keystore: &Keystore, signer: &KeyId) -> Result<Self, MandateError> {
        let bytes = self.canonical_bytes()?;
        self.signature = keystore.sign(&bytes, signer)?;
        Ok(self)
    }

    /// Verifies the mandate, accumulating every failure.
    ///
    /// Checks, in order: `not_before`, `not_after`, revocation (when an
    /// event log is supplied), issuer key presence, and the signature over
    /// the canonical bytes.
    #[must_use]
    pub fn verify(&self, keystore: &Keystore, event_log: Option<&EventLog>) -> MandateVerification {
        let mut errors = Vec::new();
        let now = Utc::now();

        if let Some(not_before) = self.validity.not_before {
            if not_before > now {
                errors.push(format!("not yet valid: mandate starts at {not_before}"));
            }
        }
        if let Some(not_after) = self.validity.not_after {
            if not_after < now {
                errors.push(format!("expired: mandate ended at {not_after}"));
            }
        }
        if let Some(log) = event_log {
            if log.is_mandate_revoked(&self.mandate_id) {
                errors.push(format!("revoked: mandate {}", self.mandate_id));
            }
        }

        let key_id = self.issuer.key_id();
        if self.signature.is_empty() {
            errors.push("mandate is unsigned".to_string());
        } else {
            match keystore.get_public_key(&key_id) {
                Err(_) => errors.push(format!("unknown issuer key: {key_id}")),
                Ok(public_key) => match self.canonical_bytes() {
                    Err(e) => errors.push(format!("canonicalization failed: {e}")),
                    Ok(bytes) => {
                        if !Keystore::verify(&self.signature, &bytes, &public_key) {
                            errors.push("signature verification failed".to_string());
                        }
                    },
                },
            }
        }

        if !errors.is_empty() {
            warn!(mandate_id = %self.mandate_id, ?errors, "mandate verification failed");
        }
        MandateVerification {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Returns `true` if the scope permits the action.
    #[must_use]
    pub fn is_action_allowed(&self, action: &str) -> bool {
        self.scope.allows_action(action)
    }

    /// Returns `true` if the scope permits the resource.
    #[must_use]
    pub fn is_resource_allowed(&self, resource: &str) -> bool {
        self.scope.allows_resource(resource)
    }

    /// Returns `true` if the value fits under the scope's spending ceiling.
    #[must_use]
    pub fn is_within_budget(&self, value: u64) -> bool {
        self.scope.within_budget(value)
    }
}

/// Builder for an unsigned [`Mandate`].
#[derive(Debug)]
pub struct MandateBuilder {
    issuer: ActorId,
    delegate: ActorId,
    scope: Scope,
    validity: Validity,
    constraints: BTreeMap<String, serde_json::Value>,
}

impl MandateBuilder {
    /// Sets the scope.
    #[must_use]
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Sets the instant before which the mandate is invalid.
    #[must_use]
    pub const fn not_before(mut self, instant: DateTime<Utc>) -> Self {
        self.validity.not_before = Some(instant);
        self
    }

    /// Sets the instant after which the mandate is invalid.
    #[must_use]
    pub const fn not_after(mut self, instant: DateTime<Utc>) -> Self {
        self.validity.not_after = Some(instant);
        self
    }

    /// Adds an opaque constraint, forwarded uninterpreted.
    #[must_use]
    pub fn constraint(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.constraints.insert(key.into(), value);
        self
    }

    /// Builds the unsigned mandate (`signature = ""`) with a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`MandateError`] for a malformed currency code or an
    /// inverted validity window.
    pub fn build(self) -> Result<Mandate, MandateError> {
        self.scope
            .validate_currency()
            .map_err(|code| MandateError::InvalidCurrency { code })?;
        if let (Some(nb), Some(na)) = (self.validity.not_before, self.validity.not_after) {
            if nb > na {
                return Err(MandateError::InvertedValidity);
            }
        }
        Ok(Mandate {
            mandate_id: Uuid::now_v7().to_string(),
            issuer: self.issuer,
            delegate: self.delegate,
            scope: self.scope,
            validity: self.validity,
            constraints: self.constraints,
            created_at: Utc::now(),
            signature: String::new(),
        })
    }
}

/// Appends a `MANDATE_CREATE` event announcing a signed mandate.
///
/// Emitting the creation explicitly makes mandate existence auditable
/// from the log alone instead of being inferred from first reference.
///
/// # Errors
///
/// Returns [`EventLogError`] if the append fails.
pub fn announce_mandate(
    mandate: &Mandate,
    keystore: &Keystore,
    event_log: &EventLog,
) -> Result<String, EventLogError> {
    event_log.append(
        EventDraft::new(
            EventPayload::MandateCreate {
                mandate_id: mandate.mandate_id.clone(),
                issuer: mandate.issuer.clone(),
                delegate: mandate.delegate.clone(),
            },
            mandate.issuer.clone(),
        ),
        keystore,
    )
}

/// Revokes a mandate by appending a `MANDATE_REVOKE` event.
///
/// Repeated revocations append repeated events; the kernel only cares
/// whether any exists.
///
/// # Errors
///
/// Returns [`EventLogError`] if the append fails; no revocation is
/// recorded in that case.
pub fn revoke_mandate(
    mandate_id: &str,
    reason: &str,
    revoked_by: &ActorId,
    keystore: &Keystore,
    event_log: &EventLog,
) -> Result<String, EventLogError> {
    warn!(mandate_id, reason, revoked_by = %revoked_by, "revoking mandate");
    event_log.append(
        EventDraft::new(
            EventPayload::MandateRevoke {
                mandate_id: mandate_id.to_string(),
                reason: reason.to_string(),
                revoked_by: revoked_by.clone(),
            },
            revoked_by.clone(),
        ),
        keystore,
    )
}
