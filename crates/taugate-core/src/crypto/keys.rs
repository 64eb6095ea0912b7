//! In-memory keystore for actor signing keys.
//!
//! Lock poisoning indicates a panic in another thread, which is
//! unrecoverable.

#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::RwLock;

use ed25519_dalek::SigningKey;
use thiserror::Error;
use zeroize::Zeroizing;

use super::did::did_key;
use super::sign::{PUBLIC_KEY_SIZE, SECRET_KEY_SIZE, sign_message, verify_signature};
use crate::actor::{ActorId, KeyId};

/// Errors that can occur during keystore operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeystoreError {
    /// No key material is stored under the requested id.
    #[error("key not found: {key_id}")]
    KeyNotFound {
        /// The key id that was not found.
        key_id: String,
    },

    /// Signing was requested for a key with no private component.
    ///
    /// Raised both for unknown keys and for verify-only entries created by
    /// [`Keystore::import_public_key`]. The `MissingPrivateKey` tag is part
    /// of the external error contract.
    #[error("MissingPrivateKey: {key_id}")]
    MissingPrivateKey {
        /// The key id lacking a private component.
        key_id: String,
    },

    /// Imported key material could not be decoded.
    #[error("invalid key material: {reason}")]
    InvalidKeyMaterial {
        /// Why the material was rejected.
        reason: String,
    },
}

/// A stored key: always a public key, optionally with its signing half.
///
/// Verify-only entries exist for remote actors whose signatures we check
/// but never produce.
#[derive(Clone)]
struct KeyEntry {
    public_key: [u8; PUBLIC_KEY_SIZE],
    signing_key: Option<SigningKey>,
}

/// In-memory store of Ed25519 keypairs, one per actor identity.
///
/// The kernel holds exactly one keystore; all key material lives in process
/// memory and survives only through the explicit export/import hooks.
/// Generation is idempotent per actor: [`Keystore::ensure_key`] returns the
/// existing keypair when one is present.
pub struct Keystore {
    keys: RwLock<HashMap<String, KeyEntry>>,
}

impl Keystore {
    /// Creates an empty keystore.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Ensures a keypair exists for the actor, generating one if absent.
    ///
    /// Returns the key id `ed25519:<actor_id>`. Idempotent: repeated calls
    /// for the same actor return the same key.
    pub fn ensure_key(&self, actor: &ActorId) -> KeyId {
        let key_id = actor.key_id();
        let mut keys = self.keys.write().unwrap();
        keys.entry(key_id.as_str().to_string()).or_insert_with(|| {
            let mut rng = rand::thread_rng();
            let signing_key = SigningKey::generate(&mut rng);
            KeyEntry {
                public_key: signing_key.verifying_key().to_bytes(),
                signing_key: Some(signing_key),
            }
        });
        key_id
    }

    /// Returns `true` if any key material is stored under the id.
    #[must_use]
    pub fn contains(&self, key_id: &KeyId) -> bool {
        self.keys.read().unwrap().contains_key(key_id.as_str())
    }

    /// Signs a message with the actor's private key.
    ///
    /// Returns the signature as 128 lower-case hex characters.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::MissingPrivateKey`] if no key is stored
    /// under the id or the stored entry has no private component.
    pub fn sign(&self, message: &[u8], key_id: &KeyId) -> Result<String, KeystoreError> {
        let keys = self.keys.read().unwrap();
        let signing_key = keys
            .get(key_id.as_str())
            .and_then(|entry| entry.signing_key.as_ref())
            .ok_or_else(|| KeystoreError::MissingPrivateKey {
                key_id: key_id.as_str().to_string(),
            })?;
        Ok(sign_message(signing_key, message))
    }

    /// Verifies a hex signature over a message under a raw public key.
    ///
    /// Malformed input of any kind is a negative result, never an error.
    #[must_use]
    pub fn verify(signature_hex: &str, message: &[u8], public_key: &[u8]) -> bool {
        verify_signature(signature_hex, message, public_key)
    }

    /// Returns the raw public key stored under the id.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::KeyNotFound`] if nothing is stored there.
    pub fn get_public_key(&self, key_id: &KeyId) -> Result<[u8; PUBLIC_KEY_SIZE], KeystoreError> {
        let keys = self.keys.read().unwrap();
        keys.get(key_id.as_str())
            .map(|entry| entry.public_key)
            .ok_or_else(|| KeystoreError::KeyNotFound {
                key_id: key_id.as_str().to_string(),
            })
    }

    /// Returns the public key as lower-case hex.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::KeyNotFound`] if nothing is stored under
    /// the id.
    pub fn export_public_key_hex(&self, key_id: &KeyId) -> Result<String, KeystoreError> {
        Ok(hex::encode(self.get_public_key(key_id)?))
    }

    /// Returns the DID-key identifier for the stored public key.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::KeyNotFound`] if nothing is stored under
    /// the id.
    pub fn did_key(&self, key_id: &KeyId) -> Result<String, KeystoreError> {
        Ok(did_key(&self.get_public_key(key_id)?))
    }

    /// Imports a full keypair from raw secret key bytes.
    ///
    /// Replaces any existing entry under the same id.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::InvalidKeyMaterial`] if the secret is not
    /// exactly 32 bytes.
    pub fn import_keypair(&self, key_id: &KeyId, secret: &[u8]) -> Result<(), KeystoreError> {
        let secret: &[u8; SECRET_KEY_SIZE] =
            secret
                .try_into()
                .map_err(|_| KeystoreError::InvalidKeyMaterial {
                    reason: format!("secret key must be {SECRET_KEY_SIZE} bytes, got {}", secret.len()),
                })?;
        let signing_key = SigningKey::from_bytes(secret);
        let entry = KeyEntry {
            public_key: signing_key.verifying_key().to_bytes(),
            signing_key: Some(signing_key),
        };
        self.keys
            .write()
            .unwrap()
            .insert(key_id.as_str().to_string(), entry);
        Ok(())
    }

    /// Imports a verify-only public key.
    ///
    /// Signing under this id fails with `MissingPrivateKey` until a full
    /// keypair is imported.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::InvalidKeyMaterial`] if the bytes are not a
    /// valid Ed25519 public key.
    pub fn import_public_key(&self, key_id: &KeyId, public_key: &[u8]) -> Result<(), KeystoreError> {
        let verifying_key = super::sign::parse_verifying_key(public_key).ok_or_else(|| {
            KeystoreError::InvalidKeyMaterial {
                reason: "not a valid Ed25519 public key".to_string(),
            }
        })?;
        let entry = KeyEntry {
            public_key: verifying_key.to_bytes(),
            signing_key: None,
        };
        self.keys
            .write()
            .unwrap()
            .insert(key_id.as_str().to_string(), entry);
        Ok(())
    }

    /// Exports the secret key bytes in a zeroizing container.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::MissingPrivateKey`] if the entry is absent
    /// or verify-only.
    pub fn export_secret_key(
        &self,
        key_id: &KeyId,
    ) -> Result<Zeroizing<[u8; SECRET_KEY_SIZE]>, KeystoreError> {
        let keys = self.keys.read().unwrap();
        let signing_key = keys
            .get(key_id.as_str())
            .and_then(|entry| entry.signing_key.as_ref())
            .ok_or_else(|| KeystoreError::MissingPrivateKey {
                key_id: key_id.as_str().to_string(),
            })?;
        Ok(Zeroizing::new(signing_key.to_bytes()))
    }

    /// Lists the key ids with stored material.
    #[must_use]
    pub fn key_ids(&self) -> Vec<String> {
        self.keys.read().unwrap().keys().cloned().collect()
    }
}

impl Default for Keystore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(s: &str) -> ActorId {
        ActorId::parse(s).unwrap()
    }

    #[test]
    fn ensure_key_is_idempotent() {
        let keystore = Keystore::new();
        let alice = actor("user:alice");

        let key_id = keystore.ensure_key(&alice);
        assert_eq!(key_id.as_str(), "ed25519:user:alice");

        let first = keystore.get_public_key(&key_id).unwrap();
        keystore.ensure_key(&alice);
        let second = keystore.get_public_key(&key_id).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let keystore = Keystore::new();
        let key_id = keystore.ensure_key(&actor("agent:planner"));

        let sig = keystore.sign(b"hello", &key_id).unwrap();
        let public = keystore.get_public_key(&key_id).unwrap();
        assert!(Keystore::verify(&sig, b"hello", &public));
        assert!(!Keystore::verify(&sig, b"other", &public));
    }

    #[test]
    fn sign_unknown_key_is_missing_private_key() {
        let keystore = Keystore::new();
        let key_id = actor("user:ghost").key_id();

        let err = keystore.sign(b"m", &key_id).unwrap_err();
        assert!(matches!(err, KeystoreError::MissingPrivateKey { .. }));
        assert!(err.to_string().starts_with("MissingPrivateKey"));
    }

    #[test]
    fn verify_only_entry_cannot_sign() {
        let keystore = Keystore::new();
        let signer = Keystore::new();
        let key_id = signer.ensure_key(&actor("provider:remote"));
        let public = signer.get_public_key(&key_id).unwrap();

        keystore.import_public_key(&key_id, &public).unwrap();
        assert!(keystore.contains(&key_id));
        assert!(matches!(
            keystore.sign(b"m", &key_id),
            Err(KeystoreError::MissingPrivateKey { .. })
        ));

        // But verification against the imported key works.
        let sig = signer.sign(b"m", &key_id).unwrap();
        let stored = keystore.get_public_key(&key_id).unwrap();
        assert!(Keystore::verify(&sig, b"m", &stored));
    }

    #[test]
    fn import_keypair_round_trip() {
        let source = Keystore::new();
        let key_id = source.ensure_key(&actor("user:alice"));
        let secret = source.export_secret_key(&key_id).unwrap();

        let target = Keystore::new();
        target.import_keypair(&key_id, &*secret).unwrap();

        // The imported keypair signs interchangeably with the original.
        let sig = target.sign(b"m", &key_id).unwrap();
        let public = source.get_public_key(&key_id).unwrap();
        assert!(Keystore::verify(&sig, b"m", &public));
    }

    #[test]
    fn import_keypair_rejects_wrong_length() {
        let keystore = Keystore::new();
        let key_id = actor("user:alice").key_id();
        assert!(matches!(
            keystore.import_keypair(&key_id, &[0u8; 16]),
            Err(KeystoreError::InvalidKeyMaterial { .. })
        ));
    }

    #[test]
    fn export_public_key_hex_is_64_chars() {
        let keystore = Keystore::new();
        let key_id = keystore.ensure_key(&actor("user:alice"));
        let hex = keystore.export_public_key_hex(&key_id).unwrap();
        assert_eq!(hex.len(), PUBLIC_KEY_SIZE * 2);
    }

    #[test]
    fn get_public_key_unknown_is_not_found() {
        let keystore = Keystore::new();
        assert!(matches!(
            keystore.get_public_key(&actor("user:ghost").key_id()),
            Err(KeystoreError::KeyNotFound { .. })
        ));
    }
}
