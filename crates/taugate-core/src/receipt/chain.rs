//! The receipt hash chain.
//!
//! Lock poisoning indicates a panic in another thread, which is
//! unrecoverable.

#![allow(clippy::missing_panics_doc)]

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::debug;

use crate::canonical::{self, CanonicalError};

/// Errors produced by receipt chain operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReceiptChainError {
    /// No link exists for the requested receipt id.
    #[error("no chain link for receipt {receipt_id}")]
    LinkNotFound {
        /// The receipt id with no link.
        receipt_id: String,
    },

    /// The link data could not be canonicalized.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),
}

/// One link in the receipt chain.
///
/// The link hash covers (`receipt_id`, canonical hash of the receipt data,
/// `previous_hash`, `index`, `timestamp`) — receipt signatures are
/// excluded, so the chain re-verifies from data alone. The first link's
/// `previous_hash` equals its own `receipt_hash`; its hash is computed
/// with an empty previous hash to break the self-reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    /// Hash of this link.
    pub receipt_hash: String,
    /// The receipt this link covers.
    pub receipt_id: String,
    /// The previous link's hash (own hash at index 0).
    pub previous_hash: String,
    /// Position in the chain, starting at 0.
    pub index: u64,
    /// When the link was added.
    pub timestamp: DateTime<Utc>,
}

/// Summary proof over the whole chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainProof {
    /// SHA-256 over the concatenation of every link hash, in order.
    pub root_hash: String,
    /// Number of links.
    pub chain_length: usize,
    /// First link hash, if the chain is non-empty.
    pub first_hash: Option<String>,
    /// Last link hash, if the chain is non-empty.
    pub last_hash: Option<String>,
}

/// Append-only hash chain over issued receipts.
///
/// Distinct from the event log: links are unsigned and derive purely from
/// receipt data, so anyone holding the receipts can rebuild and check the
/// chain without any keys.
pub struct ReceiptChain {
    links: RwLock<Vec<ChainLink>>,
}

impl ReceiptChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            links: RwLock::new(Vec::new()),
        }
    }

    /// Appends a link for a receipt and returns the new link hash.
    ///
    /// `receipt_data` is the receipt's JSON form with the signature
    /// removed (see [`super::Receipt::chain_data`]).
    ///
    /// # Errors
    ///
    /// Returns [`ReceiptChainError`] if the link cannot be canonicalized.
    pub fn add(
        &self,
        receipt_id: &str,
        receipt_data: &serde_json::Value,
    ) -> Result<String, ReceiptChainError> {
        let mut links = self.links.write().unwrap();

        let index = links.len() as u64;
        let timestamp = Utc::now();
        let previous = links.last().map(|link| link.receipt_hash.clone());
        let data_hash = canonical::hash(receipt_data)?;
        let receipt_hash = link_hash(
            receipt_id,
            &data_hash.to_hex(),
            previous.as_deref().unwrap_or(""),
            index,
            timestamp,
        )?;
        // Genesis links point at themselves.
        let previous_hash = previous.unwrap_or_else(|| receipt_hash.clone());

        debug!(receipt_id, index, "added receipt chain link");
        links.push(ChainLink {
            receipt_hash: receipt_hash.clone(),
            receipt_id: receipt_id.to_string(),
            previous_hash,
            index,
            timestamp,
        });
        Ok(receipt_hash)
    }

    /// Re-derives the link for a receipt from supplied data and compares.
    ///
    /// Also checks continuity with the prior link. Returns `true` only if
    /// both the recomputed hash and the linkage match.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiptChainError::LinkNotFound`] when the receipt has no
    /// link, or a canonicalization error.
    pub fn verify(
        &self,
        receipt_id: &str,
        receipt_data: &serde_json::Value,
    ) -> Result<bool, ReceiptChainError> {
        let links = self.links.read().unwrap();
        let position = links
            .iter()
            .position(|link| link.receipt_id == receipt_id)
            .ok_or_else(|| ReceiptChainError::LinkNotFound {
                receipt_id: receipt_id.to_string(),
            })?;
        let link = &links[position];

        let previous = if position == 0 {
            ""
        } else {
            links[position - 1].receipt_hash.as_str()
        };
        let data_hash = canonical::hash(receipt_data)?;
        let expected = link_hash(
            receipt_id,
            &data_hash.to_hex(),
            previous,
            link.index,
            link.timestamp,
        )?;

        let hash_matches: bool = expected.as_bytes().ct_eq(link.receipt_hash.as_bytes()).into();
        let continuity = if position == 0 {
            link.previous_hash == link.receipt_hash
        } else {
            link.previous_hash == links[position - 1].receipt_hash
        };
        Ok(hash_matches && continuity)
    }

    /// Checks the linkage of the whole chain.
    ///
    /// Every link at index `i > 0` must carry the previous link's hash;
    /// the genesis link must point at itself.
    #[must_use]
    pub fn verify_chain(&self) -> bool {
        let links = self.links.read().unwrap();
        links.iter().enumerate().all(|(i, link)| {
            link.index == i as u64
                && if i == 0 {
                    link.previous_hash == link.receipt_hash
                } else {
                    link.previous_hash == links[i - 1].receipt_hash
                }
        })
    }

    /// Returns a summary proof over the chain.
    #[must_use]
    pub fn proof(&self) -> ChainProof {
        let links = self.links.read().unwrap();
        let concatenated: String = links.iter().map(|link| link.receipt_hash.as_str()).collect();
        ChainProof {
            root_hash: canonical::hash_bytes(concatenated.as_bytes()).to_hex(),
            chain_length: links.len(),
            first_hash: links.first().map(|link| link.receipt_hash.clone()),
            last_hash: links.last().map(|link| link.receipt_hash.clone()),
        }
    }

    /// Returns the number of links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.read().unwrap().len()
    }

    /// Returns `true` if the chain holds no links.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.read().unwrap().is_empty()
    }

    /// Returns a copy of all links, in order.
    #[must_use]
    pub fn export(&self) -> Vec<ChainLink> {
        self.links.read().unwrap().clone()
    }

    /// Replaces the chain with an imported link list.
    ///
    /// Callers must run [`Self::verify_chain`] afterwards to re-establish
    /// trust.
    pub fn import(&self, links: Vec<ChainLink>) {
        *self.links.write().unwrap() = links;
    }
}

impl Default for ReceiptChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Derives a link hash from its constituent parts.
fn link_hash(
    receipt_id: &str,
    data_hash: &str,
    previous_hash: &str,
    index: u64,
    timestamp: DateTime<Utc>,
) -> Result<String, ReceiptChainError> {
    let value = serde_json::json!({
        "receipt_id": receipt_id,
        "data_hash": data_hash,
        "previous_hash": previous_hash,
        "index": index,
        "timestamp": timestamp,
    });
    Ok(canonical::hash(&value)?.to_hex())
}
