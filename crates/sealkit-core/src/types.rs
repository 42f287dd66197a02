//! Strong type definitions for sealkit.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::CoreError;

/// A 16-byte policy identifier, generated once at first encryption.
///
/// The id is assigned exactly once and never reused or overwritten. On the
/// wire it appears as 32 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicyId(pub [u8; 16]);

impl PolicyId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes =
            hex::decode(s).map_err(|e| CoreError::InvalidPolicyId(format!("{}: {}", s, e)))?;
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidPolicyId(format!("wrong length: {}", s)))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PolicyId({})", self.to_hex())
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for PolicyId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PolicyId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PolicyId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A resource-policy grouping key.
///
/// When set on a policy, many encrypted units share one live policy stored
/// under this key (for example all files in a folder). The value is opaque
/// and application-defined, but must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourcePolicyId(String);

impl ResourcePolicyId {
    /// Create a resource-policy id from an opaque non-empty string.
    pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.is_empty() {
            return Err(CoreError::InvalidResourcePolicyId("empty".to_string()));
        }
        Ok(Self(s))
    }

    /// Get the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourcePolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated identity: the email address of a principal.
///
/// Identities come from the external login service as verified claims; this
/// type only enforces syntax. Comparison is case-insensitive: identities are
/// lowercased on construction so that member lookups and the canonical
/// member ordering are stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Parse and validate an identity.
    ///
    /// Requires a single `@` with a non-empty local part and a dotted
    /// domain. The wire delimiters `;` and `:` are rejected so that member
    /// lists stay parseable.
    pub fn parse(s: impl AsRef<str>) -> Result<Self, CoreError> {
        let s = s.as_ref().trim();
        if s.is_empty() {
            return Err(CoreError::InvalidIdentity("empty".to_string()));
        }
        if s.chars().any(|c| c.is_whitespace() || c == ';' || c == ':') {
            return Err(CoreError::InvalidIdentity(s.to_string()));
        }
        let mut parts = s.splitn(2, '@');
        let local = parts.next().unwrap_or("");
        let domain = parts.next().unwrap_or("");
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(CoreError::InvalidIdentity(s.to_string()));
        }
        if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
            return Err(CoreError::InvalidIdentity(s.to_string()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Get the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Identity::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Access role of a member, ordered Viewer < Editor < Owner.
///
/// Editors and Viewers may decrypt; only Owners (and the author, who is
/// implicitly Owner) may mutate a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Viewer,
    Editor,
    Owner,
}

impl Role {
    /// The single-letter wire code: O, E, or V.
    pub fn code(&self) -> char {
        match self {
            Role::Owner => 'O',
            Role::Editor => 'E',
            Role::Viewer => 'V',
        }
    }

    /// Parse a wire code.
    pub fn from_code(code: &str) -> Result<Self, CoreError> {
        match code {
            "O" => Ok(Role::Owner),
            "E" => Ok(Role::Editor),
            "V" => Ok(Role::Viewer),
            other => Err(CoreError::InvalidRoleCode(other.to_string())),
        }
    }

    /// Whether this role permits policy mutation.
    pub fn can_mutate(&self) -> bool {
        matches!(self, Role::Owner)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => write!(f, "Owner"),
            Role::Editor => write!(f, "Editor"),
            Role::Viewer => write!(f, "Viewer"),
        }
    }
}

/// Contact-level override held by an author for another principal.
///
/// Consulted before membership during evaluation: Trust makes the contact an
/// Owner-equivalent delegate across all content by that author, Deny refuses
/// access regardless of membership, Allow falls through to the member list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactLevel {
    Trust,
    Deny,
    Allow,
}
