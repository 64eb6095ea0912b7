//! The Mirror: request/response capture for audit.
//!
//! Every proposed action is captured into a [`MirrorEntry`] before any
//! verification happens; when the action executes, the entry is finalized
//! with the response. Receipts reference mirror entries by id, so the
//! mirror is the bridge between "what was asked" and "what was signed
//! for".
//!
//! The `request_hash` covers the canonical form of the capture triple
//! (`agent_id`, `prompt`, `provider_metadata`); the `response_hash` covers
//! the full response object — data plus merged metadata — not just the
//! data payload.
//!
//! Lock poisoning indicates a panic in another thread, which is
//! unrecoverable.

#![allow(clippy::missing_panics_doc)]

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::actor::ActorId;
use crate::canonical::{self, CanonicalError};

/// Errors produced by mirror operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MirrorError {
    /// No entry exists under the given id.
    #[error("mirror entry not found: {id}")]
    EntryNotFound {
        /// The missing entry id.
        id: String,
    },

    /// The capture could not be canonicalized for hashing.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),
}

/// A captured request/response pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorEntry {
    /// Unique id (`mirror_<uuid7>`, time-sortable).
    pub id: String,

    /// The agent whose call was captured.
    pub agent_id: ActorId,

    /// Opaque textual record of the call.
    pub prompt: String,

    /// Canonical hash of the capture triple.
    pub request_hash: String,

    /// The response data, once captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,

    /// Canonical hash of the full response object, once captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_hash: Option<String>,

    /// Provider metadata, merged across capture and response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<serde_json::Value>,

    /// When the request was captured.
    pub timestamp: DateTime<Utc>,
}

/// In-memory store of mirror entries, keyed by id.
///
/// Ids are time-sortable, so iteration and export come out in capture
/// order.
pub struct Mirror {
    entries: RwLock<BTreeMap<String, MirrorEntry>>,
}

impl Mirror {
    /// Creates an empty mirror.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Captures a request, returning the stored entry.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError`] if the capture triple cannot be hashed.
    pub fn capture_request(
        &self,
        agent_id: &ActorId,
        prompt: &str,
        provider_metadata: Option<serde_json::Value>,
    ) -> Result<MirrorEntry, MirrorError> {
        let request_hash = canonical::hash(&serde_json::json!({
            "agent_id": agent_id,
            "prompt": prompt,
            "provider_metadata": provider_metadata,
        }))?
        .to_hex();

        let entry = MirrorEntry {
            id: format!("mirror_{}", Uuid::now_v7()),
            agent_id: agent_id.clone(),
            prompt: prompt.to_string(),
            request_hash,
            response: None,
            response_hash: None,
            provider_metadata,
            timestamp: Utc::now(),
        };
        debug!(id = %entry.id, agent = %agent_id, "captured request");
        self.entries
            .write()
            .unwrap()
            .insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    /// Finalizes an entry with its response.
    ///
    /// Sets `response`, computes `response_hash` over the full response
    /// object (data plus merged metadata), and merges any new provider
    /// metadata into the stored entry.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::EntryNotFound`] for an unknown id, or a
    /// canonicalization error.
    pub fn capture_response(
        &self,
        id: &str,
        response: serde_json::Value,
        provider_metadata: Option<serde_json::Value>,
    ) -> Result<MirrorEntry, MirrorError> {
        let mut entries = self.entries.write().unwrap();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| MirrorError::EntryNotFound { id: id.to_string() })?;

        let merged = merge_metadata(entry.provider_metadata.take(), provider_metadata);
        let response_hash = canonical::hash(&serde_json::json!({
            "data": response,
            "provider_metadata": merged,
        }))?
        .to_hex();

        entry.response = Some(response);
        entry.response_hash = Some(response_hash);
        entry.provider_metadata = merged;
        debug!(id, "captured response");
        Ok(entry.clone())
    }

    /// Returns the entry with the given id, if present.
    #[must_use]
    pub fn entry(&self, id: &str) -> Option<MirrorEntry> {
        self.entries.read().unwrap().get(id).cloned()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Returns `true` if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    /// Returns all entries in capture order.
    #[must_use]
    pub fn export(&self) -> Vec<MirrorEntry> {
        self.entries.read().unwrap().values().cloned().collect()
    }

    /// Replaces the store with imported entries.
    pub fn import(&self, entries: Vec<MirrorEntry>) {
        let mut guard = self.entries.write().unwrap();
        *guard = entries.into_iter().map(|e| (e.id.clone(), e)).collect();
    }
}

impl Default for Mirror {
    fn default() -> Self {
        Self::new()
    }
}

/// Merges response-time metadata over capture-time metadata.
///
/// Object values merge key-by-key with the newer side winning; any other
/// combination keeps the newer value when present.
fn merge_metadata(
    existing: Option<serde_json::Value>,
    incoming: Option<serde_json::Value>,
) -> Option<serde_json::Value> {
    match (existing, incoming) {
        (Some(serde_json::Value::Object(mut base)), Some(serde_json::Value::Object(new))) => {
            base.extend(new);
            Some(serde_json::Value::Object(base))
        },
        (existing, None) => existing,
        (_, incoming) => incoming,
    }
}
