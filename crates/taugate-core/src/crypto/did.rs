//! DID-key encoding of Ed25519 public keys.
//!
//! A DID-key is a self-certifying identifier carrying the public key
//! itself: the multicodec prefix for Ed25519 (`0xED 0x01`) followed by the
//! 32 key bytes, base64url-encoded without padding, under the `did:key:z`
//! prefix.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use super::sign::PUBLIC_KEY_SIZE;

/// Multicodec prefix for Ed25519 public keys.
const MULTICODEC_ED25519: [u8; 2] = [0xED, 0x01];

/// Encodes a raw Ed25519 public key as a `did:key` identifier.
#[must_use]
pub fn did_key(public_key: &[u8; PUBLIC_KEY_SIZE]) -> String {
    let mut data = Vec::with_capacity(MULTICODEC_ED25519.len() + PUBLIC_KEY_SIZE);
    data.extend_from_slice(&MULTICODEC_ED25519);
    data.extend_from_slice(public_key);
    format!("did:key:z{}", URL_SAFE_NO_PAD.encode(data))
}
