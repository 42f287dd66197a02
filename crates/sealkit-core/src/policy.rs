//! The policy value type: validation, normalization, and the wire document.
//!
//! A [`Policy`] is the authorization document bound to one encrypted unit.
//! It validates on construction and normalizes its member list to a
//! canonical identity-sorted ordering, so that two semantically equal
//! policies produce byte-identical canonical encodings (required by the
//! envelope's integrity binding).
//!
//! The wire representation is a flat document with the historical field
//! names (`id`, `role`, `blocked`, `members`, ...). `members` serializes as
//! `identity:code` pairs joined by `;` with code in {O, E, V}. Unknown
//! fields are preserved as opaque metadata for forward compatibility.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::CoreError;
use crate::types::{Identity, PolicyId, ResourcePolicyId, Role};

/// The authorization document governing one encrypted unit.
///
/// Immutable by default: `id` and `author` never change after construction.
/// Mutations go through the explicit setters, each of which records the
/// acting principal as the new `writer`. The effective `role` of a requester
/// is never part of this type; it is computed fresh per evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    id: PolicyId,
    author: Identity,
    writer: Identity,
    members: BTreeMap<Identity, Role>,
    blocked: bool,
    expiry: Option<i64>,
    notify: BTreeSet<Identity>,
    label: String,
    filename: String,
    ruri: String,
    rid: String,
    rname: String,
    rpid: Option<ResourcePolicyId>,
    extra: BTreeMap<String, Value>,
}

impl Policy {
    /// The unique identifier, assigned exactly once at first encryption.
    pub fn id(&self) -> PolicyId {
        self.id
    }

    /// The identity that performed the original encryption. Never changes.
    pub fn author(&self) -> &Identity {
        &self.author
    }

    /// The last principal who mutated this policy or its bound content.
    pub fn writer(&self) -> &Identity {
        &self.writer
    }

    /// The normalized member map, identity-sorted.
    ///
    /// The author is implicitly Owner and need not appear here.
    pub fn members(&self) -> &BTreeMap<Identity, Role> {
        &self.members
    }

    /// Whether the author has revoked access for everyone else.
    pub fn blocked(&self) -> bool {
        self.blocked
    }

    /// Optional expiry, Unix milliseconds. Once elapsed, non-author access
    /// is denied independently of `blocked`.
    pub fn expiry(&self) -> Option<i64> {
        self.expiry
    }

    /// Identities that receive a record of successful access.
    /// Representational only; delivery is an external concern.
    pub fn notify(&self) -> &BTreeSet<Identity> {
        &self.notify
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn ruri(&self) -> &str {
        &self.ruri
    }

    pub fn rid(&self) -> &str {
        &self.rid
    }

    pub fn rname(&self) -> &str {
        &self.rname
    }

    /// The resource-policy grouping key, if this unit is governed by a
    /// shared policy. When set, this policy's own members/blocked/expiry are
    /// advisory defaults used only if the shared policy is unreachable.
    pub fn rpid(&self) -> Option<&ResourcePolicyId> {
        self.rpid.as_ref()
    }

    /// Unknown wire fields preserved verbatim.
    pub fn extra(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }

    /// Look up an explicit member role.
    pub fn member_role(&self, identity: &Identity) -> Option<Role> {
        self.members.get(identity).copied()
    }

    /// Replace the member list atomically, recording the writer.
    ///
    /// An explicit entry for the author is normalized to Owner.
    pub fn replace_members(&mut self, members: BTreeMap<Identity, Role>, writer: &Identity) {
        self.members = members;
        if self.members.contains_key(&self.author) {
            self.members.insert(self.author.clone(), Role::Owner);
        }
        self.writer = writer.clone();
    }

    /// Replace the expiry, recording the writer.
    pub fn set_expiry(&mut self, expiry: Option<i64>, writer: &Identity) {
        self.expiry = expiry;
        self.writer = writer.clone();
    }

    /// Set or clear the blocked flag, recording the writer. Idempotent.
    pub fn set_blocked(&mut self, blocked: bool, writer: &Identity) {
        self.blocked = blocked;
        self.writer = writer.clone();
    }

    /// Convert to the flat wire document.
    ///
    /// `role` is the effective role resolved for the current requester; it
    /// is evaluation-time output, never stored, so the caller supplies it.
    pub fn to_document(&self, role: Option<Role>) -> PolicyDocument {
        PolicyDocument {
            id: self.id.to_hex(),
            role: role.map(|r| r.to_string()).unwrap_or_default(),
            blocked: u8::from(self.blocked),
            members: encode_members(&self.members),
            author: self.author.to_string(),
            notify: encode_notify(&self.notify),
            expiry: self
                .expiry
                .map(format_expiry)
                .unwrap_or_default(),
            label: self.label.clone(),
            filename: self.filename.clone(),
            writer: self.writer.to_string(),
            ruri: self.ruri.clone(),
            rid: self.rid.clone(),
            rname: self.rname.clone(),
            rpid: self
                .rpid
                .as_ref()
                .map(|r| r.as_str().to_string())
                .unwrap_or_default(),
            extra: self.extra.clone(),
        }
    }

    /// Parse and validate a wire document.
    ///
    /// The document's `role` field is ignored: role is evaluation-time only.
    pub fn from_document(doc: &PolicyDocument) -> Result<Self, CoreError> {
        let id = PolicyId::from_hex(&doc.id)?;
        let author = Identity::parse(&doc.author)?;
        let writer = if doc.writer.is_empty() {
            author.clone()
        } else {
            Identity::parse(&doc.writer)?
        };

        let mut members = decode_members(&doc.members)?;
        if members.contains_key(&author) {
            members.insert(author.clone(), Role::Owner);
        }

        let expiry = if doc.expiry.is_empty() {
            None
        } else {
            Some(parse_expiry(&doc.expiry)?)
        };

        let rpid = if doc.rpid.is_empty() {
            None
        } else {
            Some(ResourcePolicyId::new(doc.rpid.clone())?)
        };

        Ok(Self {
            id,
            author,
            writer,
            members,
            blocked: doc.blocked != 0,
            expiry,
            notify: decode_notify(&doc.notify)?,
            label: doc.label.clone(),
            filename: doc.filename.clone(),
            ruri: doc.ruri.clone(),
            rid: doc.rid.clone(),
            rname: doc.rname.clone(),
            rpid,
            extra: doc.extra.clone(),
        })
    }
}

// Serialized form of a Policy is its wire document; parsing re-validates.
impl Serialize for Policy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document(None).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Policy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let doc = PolicyDocument::deserialize(deserializer)?;
        Policy::from_document(&doc).map_err(serde::de::Error::custom)
    }
}

/// The flat wire document with the historical field names.
///
/// All fields are strings except `blocked` (0/1). Absent fields default to
/// empty. Unknown fields land in `extra` and survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub id: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub blocked: u8,
    #[serde(default)]
    pub members: String,
    pub author: String,
    #[serde(default)]
    pub notify: String,
    #[serde(default)]
    pub expiry: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub writer: String,
    #[serde(default)]
    pub ruri: String,
    #[serde(default)]
    pub rid: String,
    #[serde(default)]
    pub rname: String,
    #[serde(default)]
    pub rpid: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Builder for a new policy at encrypt time.
///
/// Generates a fresh [`PolicyId`] and sets `writer := author`.
pub struct PolicyBuilder {
    author: Identity,
    members: BTreeMap<Identity, Role>,
    expiry: Option<i64>,
    notify: BTreeSet<Identity>,
    label: String,
    filename: String,
    ruri: String,
    rid: String,
    rname: String,
    rpid: Option<ResourcePolicyId>,
}

impl PolicyBuilder {
    /// Start a policy authored by the given identity.
    pub fn new(author: Identity) -> Self {
        Self {
            author,
            members: BTreeMap::new(),
            expiry: None,
            notify: BTreeSet::new(),
            label: String::new(),
            filename: String::new(),
            ruri: String::new(),
            rid: String::new(),
            rname: String::new(),
            rpid: None,
        }
    }

    /// Add a member. Duplicate identities keep the last role given.
    pub fn member(mut self, identity: Identity, role: Role) -> Self {
        self.members.insert(identity, role);
        self
    }

    /// Add several members at once.
    pub fn members(mut self, members: impl IntoIterator<Item = (Identity, Role)>) -> Self {
        for (identity, role) in members {
            self.members.insert(identity, role);
        }
        self
    }

    /// Set the expiry (Unix milliseconds).
    pub fn expiry(mut self, expiry: i64) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Add a read-receipt recipient.
    pub fn notify(mut self, identity: Identity) -> Self {
        self.notify.insert(identity);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn ruri(mut self, ruri: impl Into<String>) -> Self {
        self.ruri = ruri.into();
        self
    }

    pub fn rid(mut self, rid: impl Into<String>) -> Self {
        self.rid = rid.into();
        self
    }

    pub fn rname(mut self, rname: impl Into<String>) -> Self {
        self.rname = rname.into();
        self
    }

    /// Link this unit to a shared resource policy.
    pub fn rpid(mut self, rpid: ResourcePolicyId) -> Self {
        self.rpid = Some(rpid);
        self
    }

    /// Build the policy, generating a fresh id.
    ///
    /// An explicit member entry for the author is normalized to Owner.
    pub fn build(self) -> Result<Policy, CoreError> {
        if let Some(expiry) = self.expiry {
            validate_expiry(expiry)?;
        }

        let mut members = self.members;
        if members.contains_key(&self.author) {
            members.insert(self.author.clone(), Role::Owner);
        }

        Ok(Policy {
            id: PolicyId::generate(),
            author: self.author.clone(),
            writer: self.author,
            members,
            blocked: false,
            expiry: self.expiry,
            notify: self.notify,
            label: self.label,
            filename: self.filename,
            ruri: self.ruri,
            rid: self.rid,
            rname: self.rname,
            rpid: self.rpid,
            extra: BTreeMap::new(),
        })
    }
}

/// Encode a member map as `identity:code` pairs joined by `;`.
///
/// BTreeMap iteration gives the canonical identity-sorted ordering.
pub fn encode_members(members: &BTreeMap<Identity, Role>) -> String {
    members
        .iter()
        .map(|(identity, role)| format!("{}:{}", identity, role.code()))
        .collect::<Vec<_>>()
        .join(";")
}

/// Decode a member string. Duplicate identities keep the last entry.
pub fn decode_members(s: &str) -> Result<BTreeMap<Identity, Role>, CoreError> {
    let mut members = BTreeMap::new();
    for pair in s.split(';').filter(|p| !p.is_empty()) {
        let (identity, code) = pair.rsplit_once(':').ok_or_else(|| {
            CoreError::InvalidPolicy(format!("malformed member entry: {}", pair))
        })?;
        members.insert(Identity::parse(identity)?, Role::from_code(code)?);
    }
    Ok(members)
}

fn encode_notify(notify: &BTreeSet<Identity>) -> String {
    notify
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

fn decode_notify(s: &str) -> Result<BTreeSet<Identity>, CoreError> {
    s.split(';')
        .filter(|p| !p.is_empty())
        .map(Identity::parse)
        .collect()
}

/// Largest representable expiry: 9999-12-31T23:59:59.999Z. Anything past
/// this has no RFC 3339 form and would vanish on the wire.
pub const MAX_EXPIRY_MS: i64 = 253_402_300_799_999;

/// Reject expiry timestamps that cannot survive a wire round trip.
pub fn validate_expiry(ms: i64) -> Result<(), CoreError> {
    if ms < 0 {
        return Err(CoreError::InvalidExpiry(format!(
            "negative timestamp: {}",
            ms
        )));
    }
    if ms > MAX_EXPIRY_MS {
        return Err(CoreError::InvalidExpiry(format!(
            "timestamp past year 9999: {}",
            ms
        )));
    }
    Ok(())
}

/// Format an expiry timestamp (Unix ms) as RFC 3339 UTC.
pub fn format_expiry(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => String::new(),
    }
}

/// Parse an RFC 3339 expiry into Unix milliseconds.
pub fn parse_expiry(s: &str) -> Result<i64, CoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| CoreError::InvalidExpiry(format!("{}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(s: &str) -> Identity {
        Identity::parse(s).unwrap()
    }

    #[test]
    fn test_builder_normalizes_author_to_owner() {
        let author = identity("sara@example.com");
        let policy = PolicyBuilder::new(author.clone())
            .member(author.clone(), Role::Viewer)
            .member(identity("jon@example.com"), Role::Editor)
            .build()
            .unwrap();

        assert_eq!(policy.member_role(&author), Some(Role::Owner));
        assert_eq!(policy.writer(), &author);
        assert!(!policy.blocked());
    }

    #[test]
    fn test_members_wire_roundtrip() {
        let mut members = BTreeMap::new();
        members.insert(identity("jon@theappkey.com"), Role::Editor);
        members.insert(identity("info@lockmagic.com"), Role::Viewer);

        let encoded = encode_members(&members);
        assert_eq!(encoded, "info@lockmagic.com:V;jon@theappkey.com:E");
        assert_eq!(decode_members(&encoded).unwrap(), members);
    }

    #[test]
    fn test_members_last_write_wins() {
        let decoded = decode_members("a@b.com:V;a@b.com:E").unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[&identity("a@b.com")], Role::Editor);
    }

    #[test]
    fn test_members_rejects_bad_code() {
        assert!(decode_members("a@b.com:X").is_err());
        assert!(decode_members("no-colon").is_err());
    }

    #[test]
    fn test_document_roundtrip_preserves_unknown_fields() {
        let policy = PolicyBuilder::new(identity("sara@example.com"))
            .member(identity("jon@example.com"), Role::Editor)
            .label("PureUSSDProtocol.docx")
            .filename("PureUSSDProtocol.docx")
            .expiry(1_700_000_000_000)
            .build()
            .unwrap();

        let mut doc = policy.to_document(Some(Role::Owner));
        assert_eq!(doc.role, "Owner");
        doc.extra
            .insert("x-app-tag".to_string(), Value::String("custom".to_string()));

        let json = serde_json::to_string(&doc).unwrap();
        let parsed: PolicyDocument = serde_json::from_str(&json).unwrap();
        let recovered = Policy::from_document(&parsed).unwrap();

        assert_eq!(recovered.id(), policy.id());
        assert_eq!(recovered.members(), policy.members());
        assert_eq!(recovered.expiry(), policy.expiry());
        assert_eq!(
            recovered.extra().get("x-app-tag"),
            Some(&Value::String("custom".to_string()))
        );
    }

    #[test]
    fn test_document_role_is_not_persisted() {
        let policy = PolicyBuilder::new(identity("sara@example.com"))
            .build()
            .unwrap();
        let doc = policy.to_document(Some(Role::Owner));
        let recovered = Policy::from_document(&doc).unwrap();
        // Role came back out of the document without becoming state.
        assert_eq!(recovered.to_document(None).role, "");
    }

    #[test]
    fn test_expiry_wire_roundtrip() {
        let ms = 1_478_150_978_000; // 2016-11-03T05:29:38Z
        let s = format_expiry(ms);
        assert_eq!(parse_expiry(&s).unwrap(), ms);
        assert!(parse_expiry("11/03/2016 05:29:38").is_err());
    }

    #[test]
    fn test_expiry_range_enforced_at_build() {
        let author = identity("sara@example.com");

        assert!(matches!(
            PolicyBuilder::new(author.clone()).expiry(-1).build(),
            Err(CoreError::InvalidExpiry(_))
        ));
        assert!(matches!(
            PolicyBuilder::new(author.clone()).expiry(i64::MAX).build(),
            Err(CoreError::InvalidExpiry(_))
        ));

        // The cap itself still has a wire form.
        let policy = PolicyBuilder::new(author)
            .expiry(MAX_EXPIRY_MS)
            .build()
            .unwrap();
        assert!(!format_expiry(policy.expiry().unwrap()).is_empty());
    }

    #[test]
    fn test_replace_members_updates_writer() {
        let author = identity("sara@example.com");
        let editor = identity("jon@example.com");
        let mut policy = PolicyBuilder::new(author.clone()).build().unwrap();

        let mut members = BTreeMap::new();
        members.insert(editor.clone(), Role::Owner);
        policy.replace_members(members, &editor);

        assert_eq!(policy.writer(), &editor);
        assert_eq!(policy.author(), &author);
        assert_eq!(policy.member_role(&editor), Some(Role::Owner));
    }

    #[test]
    fn test_from_document_rejects_invalid_author() {
        let policy = PolicyBuilder::new(identity("sara@example.com"))
            .build()
            .unwrap();
        let mut doc = policy.to_document(None);
        doc.author = "not-an-email".to_string();
        assert!(Policy::from_document(&doc).is_err());
    }
}
