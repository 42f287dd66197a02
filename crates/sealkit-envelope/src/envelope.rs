//! The distributable envelope: header plus ciphertext body.
//!
//! Binary layout: an 8-byte magic prefix followed by a CBOR document. The
//! magic makes sealed content cheaply recognizable without parsing.

use serde::{Deserialize, Serialize};

use sealkit_core::{canonical_policy_bytes, Policy};

use crate::crypto::{ContentKey, EnvelopeNonce, MasterKey};
use crate::error::{EnvelopeError, Result};

/// Magic prefix identifying sealed content.
pub const MAGIC: &[u8; 8] = b"SEALKIT\x01";

/// Format identifier for the envelope body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EnvelopeFormat {
    /// ChaCha20-Poly1305 with 256-bit content key.
    ChaCha20Poly1305 = 1,
}

/// Envelope header: the policy snapshot and decryption metadata.
///
/// The wrapped content key is ciphertext itself; releasing the clear key is
/// the engine's decision, made after evaluating the live policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    /// The policy snapshot taken at encrypt time. Integrity binding only:
    /// authorization always consults the live policy first.
    pub policy: Policy,

    /// MIME type of the original data.
    pub content_type: String,

    /// Original filename captured at encrypt time.
    pub filename: String,

    /// Content key wrapped under the engine's per-policy wrap key.
    pub wrapped_key: Vec<u8>,

    /// Nonce for the key wrap.
    pub key_nonce: EnvelopeNonce,
}

/// The self-contained distributable unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Encryption format.
    pub format: EnvelopeFormat,

    /// Header with policy and key material.
    pub header: EnvelopeHeader,

    /// Nonce for the body.
    pub body_nonce: EnvelopeNonce,

    /// Ciphertext of the original data (includes authentication tag).
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Seal data under a fresh content key, binding the policy as
    /// associated authenticated data.
    pub fn seal(
        data: &[u8],
        policy: &Policy,
        master: &MasterKey,
        content_type: impl Into<String>,
        filename: impl Into<String>,
    ) -> Result<Self> {
        let content_key = ContentKey::generate();
        let body_nonce = EnvelopeNonce::generate();
        let aad = canonical_policy_bytes(policy)?;
        let ciphertext = content_key.seal(data, &body_nonce, &aad)?;

        let key_nonce = EnvelopeNonce::generate();
        let wrapped_key = master.wrap_key(&policy.id()).seal(
            content_key.as_bytes(),
            &key_nonce,
            policy.id().as_bytes(),
        )?;

        Ok(Self {
            format: EnvelopeFormat::ChaCha20Poly1305,
            header: EnvelopeHeader {
                policy: policy.clone(),
                content_type: content_type.into(),
                filename: filename.into(),
                wrapped_key,
                key_nonce,
            },
            body_nonce,
            ciphertext,
        })
    }

    /// Open the envelope, verifying the tag over ciphertext and the
    /// embedded policy.
    ///
    /// This is pure integrity work: the caller must have already made the
    /// authorization decision against the live policy.
    pub fn open(&self, master: &MasterKey) -> Result<Vec<u8>> {
        let policy = &self.header.policy;
        let content_key = self.unwrap_content_key(master)?;
        let aad = canonical_policy_bytes(policy)?;
        match self.format {
            EnvelopeFormat::ChaCha20Poly1305 => {
                content_key.open(&self.ciphertext, &self.body_nonce, &aad)
            }
        }
    }

    /// Unwrap the content key under the master key.
    fn unwrap_content_key(&self, master: &MasterKey) -> Result<ContentKey> {
        let policy_id = self.header.policy.id();
        let key_bytes = master.wrap_key(&policy_id).open(
            &self.header.wrapped_key,
            &self.header.key_nonce,
            policy_id.as_bytes(),
        )?;
        let arr: [u8; 32] = key_bytes
            .try_into()
            .map_err(|_| EnvelopeError::IntegrityFailure)?;
        Ok(ContentKey::from_bytes(arr))
    }

    /// The embedded policy snapshot.
    pub fn policy(&self) -> &Policy {
        &self.header.policy
    }

    /// Serialize to bytes (magic prefix + CBOR).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = MAGIC.to_vec();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| EnvelopeError::SerializationError(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let body = bytes
            .strip_prefix(MAGIC.as_slice())
            .ok_or_else(|| EnvelopeError::NotAnEnvelope("missing magic prefix".to_string()))?;
        ciborium::from_reader(body).map_err(|e| EnvelopeError::NotAnEnvelope(e.to_string()))
    }

    /// Check whether bytes look like a sealed envelope.
    ///
    /// A cheap magic check without parsing, for encrypt-or-decrypt routing.
    pub fn is_sealed(bytes: &[u8]) -> bool {
        bytes.starts_with(MAGIC)
    }

    /// Size of the ciphertext body.
    pub fn ciphertext_len(&self) -> usize {
        self.ciphertext.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealkit_core::{Identity, PolicyBuilder, Role};

    fn identity(s: &str) -> Identity {
        Identity::parse(s).unwrap()
    }

    fn test_policy() -> Policy {
        PolicyBuilder::new(identity("sara@example.com"))
            .member(identity("jon@example.com"), Role::Editor)
            .filename("report.docx")
            .build()
            .unwrap()
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let master = MasterKey::generate();
        let policy = test_policy();
        let data = b"confidential report body";

        let envelope = Envelope::seal(data, &policy, &master, "application/msword", "report.docx")
            .unwrap();
        assert_eq!(envelope.open(&master).unwrap(), data);
    }

    #[test]
    fn test_bytes_roundtrip_with_magic() {
        let master = MasterKey::generate();
        let policy = test_policy();
        let envelope = Envelope::seal(b"data", &policy, &master, "text/plain", "a.txt").unwrap();

        let bytes = envelope.to_bytes().unwrap();
        assert!(Envelope::is_sealed(&bytes));
        assert!(!Envelope::is_sealed(b"plain old bytes"));

        let recovered = Envelope::from_bytes(&bytes).unwrap();
        assert_eq!(recovered, envelope);
        assert_eq!(recovered.open(&master).unwrap(), b"data");
    }

    #[test]
    fn test_open_wrong_master_fails() {
        let policy = test_policy();
        let envelope =
            Envelope::seal(b"data", &policy, &MasterKey::generate(), "", "").unwrap();
        assert!(matches!(
            envelope.open(&MasterKey::generate()),
            Err(EnvelopeError::IntegrityFailure)
        ));
    }

    #[test]
    fn test_policy_swap_detected() {
        let master = MasterKey::generate();
        let policy = test_policy();
        let mut envelope = Envelope::seal(b"data", &policy, &master, "", "").unwrap();

        // Swap in a different member list on the embedded snapshot.
        let mut doc = policy.to_document(None);
        doc.members = "eve@example.com:O".to_string();
        envelope.header.policy = Policy::from_document(&doc).unwrap();

        assert!(matches!(
            envelope.open(&master),
            Err(EnvelopeError::IntegrityFailure)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_detected() {
        let master = MasterKey::generate();
        let policy = test_policy();
        let mut envelope = Envelope::seal(b"data", &policy, &master, "", "").unwrap();
        let last = envelope.ciphertext.len() - 1;
        envelope.ciphertext[last] ^= 0x01;

        assert!(matches!(
            envelope.open(&master),
            Err(EnvelopeError::IntegrityFailure)
        ));
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(matches!(
            Envelope::from_bytes(b"not an envelope"),
            Err(EnvelopeError::NotAnEnvelope(_))
        ));
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[0xff, 0xff, 0xff]);
        assert!(Envelope::from_bytes(&bytes).is_err());
    }
}
