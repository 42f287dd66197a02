//! Cryptographic utilities for the envelope codec.
//!
//! ChaCha20-Poly1305 authenticated encryption with associated data, plus
//! blake3 key derivation for wrapping content keys under the master key.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use sealkit_core::PolicyId;

use crate::error::{EnvelopeError, Result};

/// A 256-bit symmetric key for ChaCha20-Poly1305.
#[derive(Clone)]
pub struct ContentKey([u8; 32]);

impl ContentKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encrypt data, authenticating `aad` alongside it.
    pub fn seal(&self, plaintext: &[u8], nonce: &EnvelopeNonce, aad: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| EnvelopeError::EncryptionError(e.to_string()))?;
        cipher
            .encrypt(
                Nonce::from_slice(&nonce.0),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|e| EnvelopeError::EncryptionError(e.to_string()))
    }

    /// Decrypt data, verifying the tag over ciphertext and `aad`.
    pub fn open(&self, ciphertext: &[u8], nonce: &EnvelopeNonce, aad: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| EnvelopeError::EncryptionError(e.to_string()))?;
        cipher
            .decrypt(
                Nonce::from_slice(&nonce.0),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| EnvelopeError::IntegrityFailure)
    }
}

/// The engine's long-lived master key.
///
/// Never leaves the engine. Content keys are wrapped under a per-policy key
/// derived from it, so an envelope alone never yields the content key in
/// clear form.
#[derive(Clone)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    /// Generate a new random master key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the wrap key for one policy.
    ///
    /// Uses blake3 derive_key for domain separation: the same master key
    /// yields an unrelated wrap key per policy id.
    pub fn wrap_key(&self, policy_id: &PolicyId) -> ContentKey {
        let mut hasher = blake3::Hasher::new_derive_key("sealkit-v1-key-wrap");
        hasher.update(&self.0);
        hasher.update(policy_id.as_bytes());
        ContentKey(*hasher.finalize().as_bytes())
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeNonce(pub [u8; 12]);

impl EnvelopeNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}
