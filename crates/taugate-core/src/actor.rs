//! Actor identities and key identifiers.
//!
//! Every principal in the system is named by an [`ActorId`] of the form
//! `role:name`, where the role distinguishes users (mandate issuers), agents
//! (mandate delegates), providers (tool back-ends), and adapters (the gate
//! itself). Actor ids double as the lookup key for public keys: the signing
//! key for `user:alice` is stored under the [`KeyId`] `ed25519:user:alice`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Maximum length of an actor name in bytes.
const MAX_NAME_LEN: usize = 256;

/// The role portion of an actor id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorRole {
    /// A human principal; issues mandates.
    User,
    /// An autonomous delegate; proposes actions.
    Agent,
    /// A tool back-end being wrapped.
    Provider,
    /// The gate instance itself.
    Adapter,
}

impl ActorRole {
    /// Returns the role as its wire string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
            Self::Provider => "provider",
            Self::Adapter => "adapter",
        }
    }

    /// Parses a role from its wire string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "agent" => Some(Self::Agent),
            "provider" => Some(Self::Provider),
            "adapter" => Some(Self::Adapter),
            _ => None,
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced when parsing or constructing an [`ActorId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActorIdError {
    /// The id is not of the form `role:name`.
    #[error("actor id must be of the form role:name, got '{value}'")]
    MissingSeparator {
        /// The offending input.
        value: String,
    },

    /// The role is not one of user, agent, provider, adapter.
    #[error("unknown actor role: '{role}'")]
    UnknownRole {
        /// The offending role string.
        role: String,
    },

    /// The name is empty, too long, or contains invalid characters.
    #[error("invalid actor name: {reason}")]
    InvalidName {
        /// Why the name was rejected.
        reason: String,
    },
}

/// A validated principal identity of the form `role:name`.
///
/// Names are restricted to `[A-Za-z0-9_-]+` so actor ids embed safely in
/// key identifiers, log lines, and canonical JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorId {
    role: ActorRole,
    name: String,
}

impl ActorId {
    /// Creates an actor id from a role and a name.
    ///
    /// # Errors
    ///
    /// Returns [`ActorIdError::InvalidName`] if the name is empty, longer
    /// than 256 bytes, or contains characters outside `[A-Za-z0-9_-]`.
    pub fn new(role: ActorRole, name: impl Into<String>) -> Result<Self, ActorIdError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self { role, name })
    }

    /// Parses an actor id from its `role:name` wire form.
    ///
    /// # Errors
    ///
    /// Returns [`ActorIdError`] if the separator is missing, the role is
    /// unknown, or the name is invalid.
    pub fn parse(s: &str) -> Result<Self, ActorIdError> {
        let (role, name) = s.split_once(':').ok_or_else(|| ActorIdError::MissingSeparator {
            value: s.to_string(),
        })?;
        let role = ActorRole::parse(role).ok_or_else(|| ActorIdError::UnknownRole {
            role: role.to_string(),
        })?;
        Self::new(role, name)
    }

    /// Returns the role.
    #[must_use]
    pub const fn role(&self) -> ActorRole {
        self.role
    }

    /// Returns the name portion.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the key identifier for this actor's Ed25519 keypair.
    #[must_use]
    pub fn key_id(&self) -> KeyId {
        KeyId(format!("ed25519:{self}"))
    }
}

fn validate_name(name: &str) -> Result<(), ActorIdError> {
    if name.is_empty() {
        return Err(ActorIdError::InvalidName {
            reason: "name is empty".to_string(),
        });
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ActorIdError::InvalidName {
            reason: format!("name exceeds {MAX_NAME_LEN} bytes: {} bytes", name.len()),
        });
    }
    for (i, c) in name.chars().enumerate() {
        if !(c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(ActorIdError::InvalidName {
                reason: format!("invalid character at position {i}: {c:?}"),
            });
        }
    }
    Ok(())
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.name)
    }
}

impl FromStr for ActorId {
    type Err = ActorIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ActorId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ActorId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Identifier for a stored keypair: `ed25519:<actor_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyId(String);

impl KeyId {
    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
