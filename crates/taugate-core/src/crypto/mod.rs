//! Cryptographic primitives for the sovereignty kernel.
//!
//! This module provides the signature layer the mandate, event, and receipt
//! modules build on:
//!
//! - **Ed25519 signatures** via constant-time primitives
//! - **Keystore**: per-actor keypair generation, lookup, and import/export
//! - **DID-key encoding** of public keys for platform-independent identity
//!
//! # Signature Encoding
//!
//! Signatures cross the boundary as 128 lower-case hex characters (64
//! bytes). Verification never panics or errors on malformed input; any
//! decoding failure is a negative result.
//!
//! Nothing above this module compares signature bytes for equality as an
//! authority decision; verification goes through [`verify_signature`] or
//! [`Keystore::verify`].
//!
//! # Example
//!
//! ```rust
//! use taugate_core::actor::ActorId;
//! use taugate_core::crypto::Keystore;
//!
//! let keystore = Keystore::new();
//! let alice = ActorId::parse("user:alice").unwrap();
//!
//! // Idempotent: the second call returns the same keypair.
//! let key_id = keystore.ensure_key(&alice);
//! assert_eq!(key_id, keystore.ensure_key(&alice));
//!
//! let signature = keystore.sign(b"message", &key_id).unwrap();
//! let public_key = keystore.get_public_key(&key_id).unwrap();
//! assert!(Keystore::verify(&signature, b"message", &public_key));
//! ```

mod did;
mod keys;
mod sign;

pub use did::did_key;
pub use keys::{Keystore, KeystoreError};
pub use sign::{
    PUBLIC_KEY_SIZE, SECRET_KEY_SIZE, SIGNATURE_SIZE, parse_verifying_key, sign_message,
    verify_signature,
};
