//! Canonical JSON serialization and content hashing.
//!
//! Every signature and every hash-chain link in the kernel depends on a
//! byte-for-byte deterministic encoding of structured data. This module is
//! the single place that encoding is produced.
//!
//! # Canonical Form
//!
//! The canonical form is RFC 8785 (JCS) JSON:
//!
//! - Object keys sorted in lexicographic (code-point) order
//! - No insignificant whitespace
//! - Numbers in shortest round-trip form
//! - Minimal string escaping (unicode escapes only for control characters)
//!
//! Canonicalization failure is a distinct error ([`CanonicalError`]); the
//! operation that needed the bytes fails with it rather than signing or
//! hashing a best-effort encoding.
//!
//! # Hashing
//!
//! `hash(value)` is the SHA-256 digest of the canonical bytes, carried as a
//! [`ContentHash`] and rendered as 64 lower-case hex characters on the wire.
//!
//! # Example
//!
//! ```rust
//! use taugate_core::canonical;
//!
//! let a = serde_json::json!({"b": 1, "a": 2});
//! let b = serde_json::json!({"a": 2, "b": 1});
//!
//! // Key order in the input does not affect the canonical bytes.
//! assert_eq!(canonical::to_bytes(&a).unwrap(), canonical::to_bytes(&b).unwrap());
//! assert_eq!(canonical::hash(&a).unwrap(), canonical::hash(&b).unwrap());
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Size of a content hash in bytes (SHA-256).
pub const HASH_SIZE: usize = 32;

/// Errors produced while canonicalizing a value.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CanonicalError {
    /// The value could not be serialized to canonical JSON.
    #[error("canonicalization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// SHA-256 digest of a value's canonical form.
///
/// Serializes as a 64-character lower-case hex string so hashes survive
/// export/import round trips unchanged.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; HASH_SIZE]);

impl ContentHash {
    /// Creates a hash from raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Returns the digest as lower-case hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a digest from a 64-character hex string.
    ///
    /// # Errors
    ///
    /// Returns [`ContentHashError`] if the string has the wrong length or
    /// contains non-hex characters.
    pub fn from_hex(s: &str) -> Result<Self, ContentHashError> {
        if s.len() != HASH_SIZE * 2 {
            return Err(ContentHashError::InvalidLength {
                expected: HASH_SIZE * 2,
                actual: s.len(),
            });
        }
        let mut bytes = [0u8; HASH_SIZE];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| ContentHashError::InvalidHex)?;
        Ok(Self(bytes))
    }

    /// Constant-time equality check.
    ///
    /// Use this wherever a hash comparison gates authority; `==` remains
    /// available for plain bookkeeping.
    #[must_use]
    pub fn ct_eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur when parsing a [`ContentHash`] from hex.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentHashError {
    /// The hex string has the wrong length.
    #[error("invalid hash length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in characters.
        expected: usize,
        /// Actual length in characters.
        actual: usize,
    },

    /// The string contains non-hex characters.
    #[error("invalid hex character in hash")]
    InvalidHex,
}

/// Serializes a value to its canonical JCS byte form.
///
/// # Errors
///
/// Returns [`CanonicalError`] if the value cannot be represented as JSON
/// (for example a map with non-string keys or a non-finite float).
pub fn to_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    Ok(serde_jcs::to_vec(value)?)
}

/// Serializes a value to its canonical JCS string form.
///
/// # Errors
///
/// Returns [`CanonicalError`] if the value cannot be represented as JSON.
pub fn to_string<T: Serialize + ?Sized>(value: &T) -> Result<String, CanonicalError> {
    Ok(serde_jcs::to_string(value)?)
}

/// Hashes a value's canonical form with SHA-256.
///
/// # Errors
///
/// Returns [`CanonicalError`] if canonicalization fails.
pub fn hash<T: Serialize + ?Sized>(value: &T) -> Result<ContentHash, CanonicalError> {
    Ok(hash_bytes(&to_bytes(value)?))
}

/// Hashes raw bytes with SHA-256.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    let digest = Sha256::digest(bytes);
    ContentHash(digest.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_sorts_object_keys() {
        let value = serde_json::json!({"z": 1, "a": 2, "m": 3});
        let bytes = to_bytes(&value).unwrap();
        assert_eq!(bytes, br#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn canonical_is_stable_across_key_orders() {
        let inputs = [
            serde_json::json!({"c": 3, "a": 1, "b": 2}),
            serde_json::json!({"a": 1, "b": 2, "c": 3}),
            serde_json::json!({"b": 2, "c": 3, "a": 1}),
        ];
        let encodings: Vec<Vec<u8>> = inputs.iter().map(|v| to_bytes(v).unwrap()).collect();
        assert!(encodings.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn canonical_has_no_whitespace() {
        let value = serde_json::json!({"key": "value", "num": 42});
        assert_eq!(to_string(&value).unwrap(), r#"{"key":"value","num":42}"#);
    }

    #[test]
    fn canonical_sorts_nested_objects() {
        let value = serde_json::json!({"outer": {"z": 1, "a": 2}});
        assert_eq!(to_string(&value).unwrap(), r#"{"outer":{"a":2,"z":1}}"#);
    }

    #[test]
    fn canonical_preserves_array_order() {
        let value = serde_json::json!([3, 1, 2]);
        assert_eq!(to_string(&value).unwrap(), "[3,1,2]");
    }

    #[test]
    fn hash_is_hex_sha256() {
        // SHA-256 of the canonical bytes `{}` (empty object).
        let h = hash(&serde_json::json!({})).unwrap();
        assert_eq!(
            h.to_hex(),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn hash_differs_for_different_values() {
        let a = hash(&serde_json::json!({"x": 1})).unwrap();
        let b = hash(&serde_json::json!({"x": 2})).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn content_hash_hex_round_trip() {
        let h = hash_bytes(b"payload");
        let parsed = ContentHash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, parsed);
        assert!(h.ct_eq(&parsed));
    }

    #[test]
    fn content_hash_rejects_bad_hex() {
        assert!(matches!(
            ContentHash::from_hex("zz"),
            Err(ContentHashError::InvalidLength { .. })
        ));
        let bad = "z".repeat(64);
        assert!(matches!(
            ContentHash::from_hex(&bad),
            Err(ContentHashError::InvalidHex)
        ));
    }

    #[test]
    fn content_hash_serde_round_trip() {
        let h = hash_bytes(b"wire");
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{}\"", h.to_hex()));
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }
}
