//! Golden wire vectors.
//!
//! Known policy documents in the historical flat wire format, with the
//! results a conforming parser must produce. These pin compatibility with
//! documents already in circulation: a change that breaks a vector breaks
//! deployed content.

use sealkit_core::{CoreError, Identity, Policy, Role};

/// One golden vector: a wire document and expectations about its parse.
pub struct GoldenVector {
    pub name: &'static str,
    pub json: &'static str,
    pub author: &'static str,
    pub member_count: usize,
    pub blocked: bool,
    pub expiry_ms: Option<i64>,
}

impl GoldenVector {
    /// Parse the vector's document into a policy.
    pub fn parse(&self) -> Result<Policy, CoreError> {
        let doc = serde_json::from_str(self.json)
            .map_err(|e| CoreError::DecodingError(e.to_string()))?;
        Policy::from_document(&doc)
    }
}

/// All golden vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "minimal",
            json: r#"{
                "id": "00112233445566778899aabbccddeeff",
                "author": "sara@example.com"
            }"#,
            author: "sara@example.com",
            member_count: 0,
            blocked: false,
            expiry_ms: None,
        },
        GoldenVector {
            name: "full-document",
            json: r#"{
                "id": "ffeeddccbbaa99887766554433221100",
                "role": "Owner",
                "blocked": 0,
                "members": "jon@theappkey.com:E;info@lockmagic.com:V",
                "author": "sara@example.com",
                "notify": "sara@example.com",
                "expiry": "2016-11-03T05:29:38Z",
                "label": "PureUSSDProtocol.docx",
                "filename": "PureUSSDProtocol.docx",
                "writer": "jon@theappkey.com",
                "ruri": "smb://fileserver/protocols",
                "rid": "doc-4417",
                "rname": "protocols",
                "rpid": "folder-protocols"
            }"#,
            author: "sara@example.com",
            member_count: 2,
            blocked: false,
            expiry_ms: Some(1_478_150_978_000),
        },
        GoldenVector {
            name: "blocked-with-unknown-fields",
            json: r#"{
                "id": "0123456789abcdef0123456789abcdef",
                "blocked": 1,
                "members": "omar@example.org:O",
                "author": "sara@example.com",
                "x-client-version": "4.2.1"
            }"#,
            author: "sara@example.com",
            member_count: 1,
            blocked: true,
            expiry_ms: None,
        },
    ]
}

/// Parse every vector and check its expectations. Returns the first
/// failure as a message naming the vector.
pub fn verify_all_vectors() -> Result<(), String> {
    for vector in all_vectors() {
        let policy = vector
            .parse()
            .map_err(|e| format!("{}: parse failed: {}", vector.name, e))?;

        let author = Identity::parse(vector.author)
            .map_err(|e| format!("{}: bad expected author: {}", vector.name, e))?;
        if policy.author() != &author {
            return Err(format!("{}: author mismatch", vector.name));
        }
        if policy.members().len() != vector.member_count {
            return Err(format!(
                "{}: expected {} members, got {}",
                vector.name,
                vector.member_count,
                policy.members().len()
            ));
        }
        if policy.blocked() != vector.blocked {
            return Err(format!("{}: blocked mismatch", vector.name));
        }
        if policy.expiry() != vector.expiry_ms {
            return Err(format!("{}: expiry mismatch", vector.name));
        }

        // Reserialization must survive a parse round trip.
        let doc = policy.to_document(None);
        let json = serde_json::to_string(&doc)
            .map_err(|e| format!("{}: reserialize failed: {}", vector.name, e))?;
        let reparsed: sealkit_core::PolicyDocument = serde_json::from_str(&json)
            .map_err(|e| format!("{}: reparse failed: {}", vector.name, e))?;
        let recovered = Policy::from_document(&reparsed)
            .map_err(|e| format!("{}: revalidation failed: {}", vector.name, e))?;
        if recovered != policy {
            return Err(format!("{}: round trip changed the policy", vector.name));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_verify() {
        verify_all_vectors().unwrap();
    }

    #[test]
    fn test_full_document_details() {
        let vectors = all_vectors();
        let full = vectors.iter().find(|v| v.name == "full-document").unwrap();
        let policy = full.parse().unwrap();

        let jon = Identity::parse("jon@theappkey.com").unwrap();
        assert_eq!(policy.member_role(&jon), Some(Role::Editor));
        assert_eq!(policy.writer(), &jon);
        assert_eq!(policy.label(), "PureUSSDProtocol.docx");
        assert_eq!(policy.rpid().unwrap().as_str(), "folder-protocols");
        assert_eq!(policy.notify().len(), 1);
    }

    #[test]
    fn test_unknown_fields_preserved() {
        let vectors = all_vectors();
        let vector = vectors
            .iter()
            .find(|v| v.name == "blocked-with-unknown-fields")
            .unwrap();
        let policy = vector.parse().unwrap();
        assert_eq!(
            policy.extra().get("x-client-version"),
            Some(&serde_json::Value::String("4.2.1".to_string()))
        );
    }
}
