//! Error types for the envelope codec.

use thiserror::Error;

/// Errors that can occur while sealing or opening envelopes.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Authenticated-encryption verification failed: ciphertext or the
    /// policy it was bound to has been tampered with. Always fatal to the
    /// attempt, never retried transparently.
    #[error("integrity failure: ciphertext or bound policy was tampered with")]
    IntegrityFailure,

    /// Encryption failed.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// The bytes are not a sealed envelope.
    #[error("not a sealed envelope: {0}")]
    NotAnEnvelope(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Core error from policy handling.
    #[error("core error: {0}")]
    Core(#[from] sealkit_core::CoreError),
}

/// Result type for envelope operations.
pub type Result<T> = std::result::Result<T, EnvelopeError>;
