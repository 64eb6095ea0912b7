//! Legacy revocation hash chain.
//!
//! An ordered list of `{hash, timestamp}` links where the current head
//! marks the live authority: each revocation appends a link derived from
//! the previous hash, pushing every earlier hash into "revoked" territory.
//!
//! This structure is retained for schema compatibility and remains
//! addressable, but it does not decide authorization: the event log's
//! `MANDATE_REVOKE` events are authoritative (see
//! [`crate::events::EventLog::is_mandate_revoked`]).
//!
//! The persisted form is the full link list, so deeply revoked chains
//! round-trip losslessly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::canonical::{self, CanonicalError};

/// Errors produced by revocation chain operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RevocationError {
    /// A link could not be canonicalized for hashing.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),
}

/// One link in the revocation chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationLink {
    /// Hash of this link.
    pub hash: String,
    /// When the link was created.
    pub timestamp: DateTime<Utc>,
}

/// Hash chain whose head marks the currently live authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationChain {
    links: Vec<RevocationLink>,
}

impl RevocationChain {
    /// Creates a chain with a genesis link derived from the subject id.
    ///
    /// # Errors
    ///
    /// Returns [`RevocationError`] if the genesis link cannot be hashed.
    pub fn new(subject: &str) -> Result<Self, RevocationError> {
        let timestamp = Utc::now();
        let hash = canonical::hash(&serde_json::json!({
            "subject": subject,
            "timestamp": timestamp,
            "action": "genesis",
        }))?
        .to_hex();
        Ok(Self {
            links: vec![RevocationLink { hash, timestamp }],
        })
    }

    /// Appends a revocation link and returns the new head hash.
    ///
    /// The previous head becomes a revoked hash.
    ///
    /// # Errors
    ///
    /// Returns [`RevocationError`] if the link cannot be hashed.
    pub fn revoke(&mut self) -> Result<String, RevocationError> {
        let timestamp = Utc::now();
        let previous_hash = self.head().hash.clone();
        let hash = derive_link(&previous_hash, timestamp)?;
        self.links.push(RevocationLink {
            hash: hash.clone(),
            timestamp,
        });
        Ok(hash)
    }

    /// Returns the current head link.
    ///
    /// # Panics
    ///
    /// Panics if the chain was deserialized from a form with no links;
    /// every constructor seeds a genesis link.
    #[must_use]
    pub fn head(&self) -> &RevocationLink {
        // Construction guarantees at least the genesis link.
        self.links.last().expect("chain always has a genesis link")
    }

    /// Returns `true` if the hash is the current head.
    #[must_use]
    pub fn is_valid(&self, hash: &str) -> bool {
        self.head().hash == hash
    }

    /// Returns `true` if the hash appears in the chain but is no longer
    /// the head.
    #[must_use]
    pub fn was_revoked(&self, hash: &str) -> bool {
        let head = &self.head().hash;
        self.links.iter().any(|link| link.hash == hash && &link.hash != head)
    }

    /// Recomputes every derived link and compares against the stored
    /// hashes.
    ///
    /// The genesis link is taken as the trust anchor; verification starts
    /// at the first derived link.
    #[must_use]
    pub fn verify_chain(&self) -> bool {
        self.links.windows(2).all(|pair| {
            derive_link(&pair[0].hash, pair[1].timestamp)
                .map(|expected| expected == pair[1].hash)
                .unwrap_or(false)
        })
    }

    /// Returns the number of links, genesis included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Returns `true` if only the genesis link exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.len() <= 1
    }

    /// Returns the full link list, in order.
    #[must_use]
    pub fn links(&self) -> &[RevocationLink] {
        &self.links
    }
}

/// Derives a link hash from the previous hash and a timestamp.
fn derive_link(
    previous_hash: &str,
    timestamp: DateTime<Utc>,
) -> Result<String, RevocationError> {
    Ok(canonical::hash(&serde_json::json!({
        "previous_hash": previous_hash,
        "timestamp": timestamp,
        "action": "revoke",
    }))?
    .to_hex())
}
