//! Signed execution receipts and the receipt hash chain.
//!
//! A receipt is independent evidence that an action was executed under a
//! mandate: it binds the action, the request/response hashes, and the
//! mirror entry, and carries a signature from the issuing actor. Receipts
//! are additionally linked into a second hash chain ([`ReceiptChain`],
//! distinct from the event log) whose links cover receipt **data** but not
//! receipt signatures, so the chain can be re-verified from data alone.

mod chain;

pub use chain::{ChainLink, ChainProof, ReceiptChain, ReceiptChainError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::actor::ActorId;
use crate::canonical::{self, CanonicalError};
use crate::crypto::{Keystore, KeystoreError};

/// Errors produced while issuing or verifying receipts.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReceiptError {
    /// No public key is stored for the receipt's actor.
    #[error("unknown actor key for receipt {receipt_id}: {key_id}")]
    UnknownActorKey {
        /// The receipt being verified.
        receipt_id: String,
        /// The missing key id.
        key_id: String,
    },

    /// The signature does not verify over the canonical receipt bytes.
    #[error("signature verification failed for receipt {receipt_id}")]
    SignatureInvalid {
        /// The receipt that failed.
        receipt_id: String,
    },

    /// The receipt could not be canonicalized.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),

    /// Signing failed in the keystore.
    #[error(transparent)]
    Keystore(#[from] KeystoreError),
}

/// Inputs for [`Receipt::issue`].
#[derive(Debug, Clone)]
pub struct ReceiptParams {
    /// The authorizing mandate, when one exists.
    pub mandate_id: Option<String>,
    /// The actor issuing (and signing) the receipt.
    pub actor: ActorId,
    /// The executed tool/action string.
    pub action: String,
    /// Hash or reference identifying the request. The gate as shipped
    /// passes the mirror reference id; wrapping layers may pass a true
    /// canonical hash of the request payload instead.
    pub request_hash: String,
    /// Canonical hash of the execution output, if any.
    pub response_hash: Option<String>,
    /// Opaque provider metadata, forwarded uninterpreted.
    pub provider_metadata: Option<serde_json::Value>,
    /// The mirror entry capturing this request/response pair.
    pub mirror_ref: String,
}

/// A signed record of an executed action, bound to its mandate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// Time-sortable unique id (UUID v7, lower-case).
    pub receipt_id: String,

    /// The authorizing mandate, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mandate_id: Option<String>,

    /// The actor whose key signed this receipt.
    pub actor: ActorId,

    /// The executed tool/action string.
    pub action: String,

    /// Hash or reference identifying the request.
    pub request_hash: String,

    /// Canonical hash of the execution output, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_hash: Option<String>,

    /// Opaque provider metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<serde_json::Value>,

    /// When the receipt was issued.
    pub timestamp: DateTime<Utc>,

    /// The mirror entry for this request/response pair.
    pub mirror_ref: String,

    /// Signature (128 hex chars) over the canonical receipt minus this
    /// field.
    pub signature: String,
}

impl Receipt {
    /// Constructs and signs a receipt. No side effects.
    ///
    /// The signature is produced by the `actor`'s key over the canonical
    /// receipt with the `signature` key removed.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiptError`] on canonicalization failure or when the
    /// actor's key has no private component.
    pub fn issue(params: ReceiptParams, keystore: &Keystore) -> Result<Self, ReceiptError> {
        let mut receipt = Self {
            receipt_id: Uuid::now_v7().to_string(),
            mandate_id: params.mandate_id,
            actor: params.actor,
            action: params.action,
            request_hash: params.request_hash,
            response_hash: params.response_hash,
            provider_metadata: params.provider_metadata,
            timestamp: Utc::now(),
            mirror_ref: params.mirror_ref,
            signature: String::new(),
        };
        let bytes = receipt.canonical_bytes()?;
        receipt.signature = keystore.sign(&bytes, &receipt.actor.key_id())?;
        info!(receipt_id = %receipt.receipt_id, action = %receipt.action, "issued receipt");
        Ok(receipt)
    }

    /// Returns the canonical bytes the signature covers.
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

    /// Returns the receipt's data as a JSON value with the signature
    /// removed — the form the receipt chain links over.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError`] if the receipt cannot be serialized.
    pub fn chain_data(&self) -> Result<serde_json::Value, CanonicalError> {
        let mut value = serde_json::to_value(self)?;
        if let Some(object) = value.as_object_mut() {
            object.remove("signature");
        }
        Ok(value)
    }

    /// Verifies the signature under the actor's public key.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiptError::UnknownActorKey`] when the actor's key is
    /// absent, [`ReceiptError::SignatureInvalid`] when the signature does
    /// not verify (including malformed hex), or a canonicalization error.
    pub fn verify(&self, keystore: &Keystore) -> Result<(), ReceiptError> {
        let key_id = self.actor.key_id();
        let public_key =
            keystore
                .get_public_key(&key_id)
                .map_err(|_| ReceiptError::UnknownActorKey {
                    receipt_id: self.receipt_id.clone(),
                    key_id: key_id.as_str().to_string(),
                })?;
        let bytes = self.canonical_bytes()?;
        if !Keystore::verify(&self.signature, &bytes, &public_key) {
            return Err(ReceiptError::SignatureInvalid {
                receipt_id: self.receipt_id.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> ActorId {
        ActorId::parse("adapter:tau-gate").unwrap()
    }

    fn params(actor: ActorId) -> ReceiptParams {
        ReceiptParams {
            mandate_id: Some("m-1".to_string()),
            actor,
            action: "invoke:model".to_string(),
            request_hash: "mirror_0".to_string(),
            response_hash: Some("ab".repeat(32)),
            provider_metadata: None,
            mirror_ref: "mirror_0".to_string(),
        }
    }

    #[test]
    fn issue_then_verify() {
        let keystore = Keystore::new();
        let actor = adapter();
        keystore.ensure_key(&actor);

        let receipt = Receipt::issue(params(actor), &keystore).unwrap();
        assert_eq!(receipt.signature.len(), 128);
        receipt.verify(&keystore).unwrap();
    }

    #[test]
    fn issue_without_key_is_missing_private_key() {
        let keystore = Keystore::new();
        let result = Receipt::issue(params(adapter()), &keystore);
        assert!(matches!(
            result,
            Err(ReceiptError::Keystore(KeystoreError::MissingPrivateKey { .. }))
        ));
    }

    #[test]
    fn tampered_receipt_fails_verification() {
        let keystore = Keystore::new();
        let actor = adapter();
        keystore.ensure_key(&actor);

        let mut receipt = Receipt::issue(params(actor), &keystore).unwrap();
        receipt.action = "delete_everything".to_string();
        assert!(matches!(
            receipt.verify(&keystore),
            Err(ReceiptError::SignatureInvalid { .. })
        ));
    }

    #[test]
    fn verify_with_unknown_actor_key() {
        let keystore = Keystore::new();
        let actor = adapter();
        keystore.ensure_key(&actor);
        let receipt = Receipt::issue(params(actor), &keystore).unwrap();

        let stranger = Keystore::new();
        assert!(matches!(
            receipt.verify(&stranger),
            Err(ReceiptError::UnknownActorKey { .. })
        ));
    }

    #[test]
    fn malformed_signature_is_invalid_not_fatal() {
        let keystore = Keystore::new();
        let actor = adapter();
        keystore.ensure_key(&actor);

        let mut receipt = Receipt::issue(params(actor), &keystore).unwrap();
        receipt.signature = "not-hex".to_string();
        assert!(matches!(
            receipt.verify(&keystore),
            Err(ReceiptError::SignatureInvalid { .. })
        ));
    }

    #[test]
    fn chain_data_excludes_signature() {
        let keystore = Keystore::new();
        let actor = adapter();
        keystore.ensure_key(&actor);

        let receipt = Receipt::issue(params(actor), &keystore).unwrap();
        let data = receipt.chain_data().unwrap();
        assert!(data.get("signature").is_none());
        assert_eq!(data["receipt_id"], receipt.receipt_id.as_str());
    }

    #[test]
    fn receipt_serde_round_trip_preserves_signature() {
        let keystore = Keystore::new();
        let actor = adapter();
        keystore.ensure_key(&actor);

        let receipt = Receipt::issue(params(actor), &keystore).unwrap();
        let json = serde_json::to_string(&receipt).unwrap();
        let back: Receipt = serde_json::from_str(&json).unwrap();
        assert_eq!(receipt, back);
        back.verify(&keystore).unwrap();
    }
}
