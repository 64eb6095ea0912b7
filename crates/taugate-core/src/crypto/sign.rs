//! Ed25519 signing and verification helpers.
//!
//! Thin glue over `ed25519-dalek`. Signatures travel as lower-case hex;
//! verification uses `verify_strict` and treats every decoding failure as a
//! negative result rather than an error.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};

/// Size of an Ed25519 signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Size of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of an Ed25519 secret key in bytes.
pub const SECRET_KEY_SIZE: usize = 32;

/// Signs a message, returning the signature as 128 lower-case hex chars.
#[must_use]
pub fn sign_message(signing_key: &SigningKey, message: &[u8]) -> String {
    hex::encode(signing_key.sign(message).to_bytes())
}

/// Parses a verifying key from raw bytes.
///
/// Returns `None` if the bytes are not a valid curve point or have the
/// wrong length.
#[must_use]
pub fn parse_verifying_key(bytes: &[u8]) -> Option<VerifyingKey> {
    let bytes: &[u8; PUBLIC_KEY_SIZE] = bytes.try_into().ok()?;
    VerifyingKey::from_bytes(bytes).ok()
}

/// Verifies a hex-encoded signature over a message under a raw public key.
///
/// Malformed signatures, malformed keys, and verification failures all
/// return `false`; this function never panics or errors.
#[must_use]
pub fn verify_signature(signature_hex: &str, message: &[u8], public_key: &[u8]) -> bool {
    let Some(verifying_key) = parse_verifying_key(public_key) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; SIGNATURE_SIZE]>::try_from(sig_bytes.as_slice()) else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);
    verifying_key.verify_strict(message, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SigningKey {
        let mut rng = rand::thread_rng();
        SigningKey::generate(&mut rng)
    }

    #[test]
    fn sign_produces_128_hex_chars() {
        let key = test_key();
        let sig = sign_message(&key, b"payload");
        assert_eq!(sig.len(), SIGNATURE_SIZE * 2);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn round_trip_verifies() {
        let key = test_key();
        let sig = sign_message(&key, b"payload");
        let public = key.verifying_key().to_bytes();
        assert!(verify_signature(&sig, b"payload", &public));
    }

    #[test]
    fn wrong_message_fails() {
        let key = test_key();
        let sig = sign_message(&key, b"payload");
        let public = key.verifying_key().to_bytes();
        assert!(!verify_signature(&sig, b"tampered", &public));
    }

    #[test]
    fn wrong_key_fails() {
        let key = test_key();
        let other = test_key();
        let sig = sign_message(&key, b"payload");
        assert!(!verify_signature(&sig, b"payload", &other.verifying_key().to_bytes()));
    }

    #[test]
    fn malformed_inputs_are_negative_not_fatal() {
        let key = test_key();
        let public = key.verifying_key().to_bytes();
        // Not hex.
        assert!(!verify_signature("not-hex", b"m", &public));
        // Wrong signature length.
        assert!(!verify_signature("deadbeef", b"m", &public));
        // Wrong key length.
        let sig = sign_message(&key, b"m");
        assert!(!verify_signature(&sig, b"m", &[0u8; 16]));
        // Empty everything.
        assert!(!verify_signature("", b"", &[]));
    }
}
