//! Canonical CBOR encoding of a policy.
//!
//! The canonical bytes are the associated authenticated data of the
//! envelope: the policy snapshot taken at encrypt time is bound to the
//! ciphertext so it cannot be swapped onto different content undetected.
//!
//! Deterministic by construction:
//! - Map keys are small integers, emitted in ascending order
//! - Members and notify entries are identity-sorted (BTree ordering)
//! - Definite lengths only, no floats (timestamps are i64 milliseconds)
//!
//! Unknown wire fields are opaque application metadata and are not part of
//! the integrity binding.

use ciborium::value::Value;

use crate::error::CoreError;
use crate::policy::Policy;

/// Field keys. Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const ID: u64 = 0;
    pub const AUTHOR: u64 = 1;
    pub const WRITER: u64 = 2;
    pub const MEMBERS: u64 = 3;
    pub const BLOCKED: u64 = 4;
    pub const EXPIRY: u64 = 5;
    pub const NOTIFY: u64 = 6;
    pub const LABEL: u64 = 7;
    pub const FILENAME: u64 = 8;
    pub const RURI: u64 = 9;
    pub const RID: u64 = 10;
    pub const RNAME: u64 = 11;
    pub const RPID: u64 = 12;
}

/// Encode a policy to canonical CBOR bytes.
///
/// Two semantically equal policies produce identical bytes.
pub fn canonical_policy_bytes(policy: &Policy) -> Result<Vec<u8>, CoreError> {
    let value = policy_to_cbor_value(policy);
    let mut buf = Vec::new();
    ciborium::into_writer(&value, &mut buf)
        .map_err(|e| CoreError::EncodingError(e.to_string()))?;
    Ok(buf)
}

/// Convert a policy to a CBOR Value (map with integer keys in order).
fn policy_to_cbor_value(policy: &Policy) -> Value {
    let mut entries = Vec::with_capacity(13);

    entries.push((
        Value::Integer(keys::ID.into()),
        Value::Bytes(policy.id().as_bytes().to_vec()),
    ));
    entries.push((
        Value::Integer(keys::AUTHOR.into()),
        Value::Text(policy.author().to_string()),
    ));
    entries.push((
        Value::Integer(keys::WRITER.into()),
        Value::Text(policy.writer().to_string()),
    ));

    // Members as [identity, code] pairs, already sorted by identity.
    let members: Vec<Value> = policy
        .members()
        .iter()
        .map(|(identity, role)| {
            Value::Array(vec![
                Value::Text(identity.to_string()),
                Value::Text(role.code().to_string()),
            ])
        })
        .collect();
    entries.push((Value::Integer(keys::MEMBERS.into()), Value::Array(members)));

    entries.push((
        Value::Integer(keys::BLOCKED.into()),
        Value::Bool(policy.blocked()),
    ));

    let expiry = match policy.expiry() {
        Some(ms) => Value::Integer(ms.into()),
        None => Value::Null,
    };
    entries.push((Value::Integer(keys::EXPIRY.into()), expiry));

    let notify: Vec<Value> = policy
        .notify()
        .iter()
        .map(|i| Value::Text(i.to_string()))
        .collect();
    entries.push((Value::Integer(keys::NOTIFY.into()), Value::Array(notify)));

    entries.push((
        Value::Integer(keys::LABEL.into()),
        Value::Text(policy.label().to_string()),
    ));
    entries.push((
        Value::Integer(keys::FILENAME.into()),
        Value::Text(policy.filename().to_string()),
    ));
    entries.push((
        Value::Integer(keys::RURI.into()),
        Value::Text(policy.ruri().to_string()),
    ));
    entries.push((
        Value::Integer(keys::RID.into()),
        Value::Text(policy.rid().to_string()),
    ));
    entries.push((
        Value::Integer(keys::RNAME.into()),
        Value::Text(policy.rname().to_string()),
    ));

    let rpid = match policy.rpid() {
        Some(r) => Value::Text(r.as_str().to_string()),
        None => Value::Null,
    };
    entries.push((Value::Integer(keys::RPID.into()), rpid));

    Value::Map(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Policy, PolicyBuilder};
    use crate::types::{Identity, Role};

    fn identity(s: &str) -> Identity {
        Identity::parse(s).unwrap()
    }

    #[test]
    fn test_canonical_bytes_deterministic() {
        let policy = PolicyBuilder::new(identity("sara@example.com"))
            .member(identity("jon@example.com"), Role::Editor)
            .member(identity("info@lockmagic.com"), Role::Viewer)
            .expiry(1_700_000_000_000)
            .build()
            .unwrap();

        let a = canonical_policy_bytes(&policy).unwrap();
        let b = canonical_policy_bytes(&policy).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_canonical_bytes_independent_of_insertion_order() {
        let author = identity("sara@example.com");
        let p1 = PolicyBuilder::new(author.clone())
            .member(identity("a@example.com"), Role::Viewer)
            .member(identity("b@example.com"), Role::Editor)
            .build()
            .unwrap();
        let p2 = PolicyBuilder::new(author)
            .member(identity("b@example.com"), Role::Editor)
            .member(identity("a@example.com"), Role::Viewer)
            .build()
            .unwrap();

        // Ids differ, so compare everything past the id entry by stripping
        // nothing: rebuild p2 with p1's document id instead.
        let mut doc = p2.to_document(None);
        doc.id = p1.id().to_hex();
        let p2 = Policy::from_document(&doc).unwrap();

        assert_eq!(
            canonical_policy_bytes(&p1).unwrap(),
            canonical_policy_bytes(&p2).unwrap()
        );
    }

    #[test]
    fn test_canonical_bytes_change_with_members() {
        let author = identity("sara@example.com");
        let p1 = PolicyBuilder::new(author.clone()).build().unwrap();
        let mut doc = p1.to_document(None);
        doc.members = "jon@example.com:E".to_string();
        let p2 = Policy::from_document(&doc).unwrap();

        assert_ne!(
            canonical_policy_bytes(&p1).unwrap(),
            canonical_policy_bytes(&p2).unwrap()
        );
    }
}
