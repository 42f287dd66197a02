//! Error types for the engine.

use thiserror::Error;

use sealkit_core::CoreError;
use sealkit_envelope::EnvelopeError;
use sealkit_store::StoreError;

/// Errors that can occur during engine operations.
///
/// Decrypt-time denials (Blocked, Expired, NotAuthorized) are *not* errors;
/// they are normal evaluation outcomes carried by
/// [`DecryptOutcome`](crate::DecryptOutcome) so callers can always tell a
/// denial from a transport failure.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed input that failed validation before any state change.
    #[error("invalid policy: {0}")]
    InvalidPolicy(#[from] CoreError),

    /// Envelope error, including integrity failures.
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The access token did not resolve to a verified identity.
    #[error("invalid access token")]
    InvalidToken,

    /// The actor lacks the role required for a mutation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The referenced id or rpid has no known policy. Distinguished from a
    /// denial: the caller may not know whether the content ever existed.
    #[error("not found: {0}")]
    NotFound(String),

    /// A bounded-time operation did not complete. Safe to retry.
    #[error("operation timed out")]
    Timeout,

    /// Transient failure. Safe to retry with backoff.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl EngineError {
    /// Machine-readable reason code for the caller.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidPolicy(_) => "InvalidPolicy",
            EngineError::Envelope(EnvelopeError::IntegrityFailure) => "IntegrityFailure",
            EngineError::Envelope(_) => "InvalidEnvelope",
            EngineError::Store(_) => "Unavailable",
            EngineError::InvalidToken => "InvalidToken",
            EngineError::Forbidden(_) => "Forbidden",
            EngineError::NotFound(_) => "NotFound",
            EngineError::Timeout => "Timeout",
            EngineError::Unavailable(_) => "Unavailable",
        }
    }

    /// Whether the caller may retry without side effects.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Timeout | EngineError::Unavailable(_) | EngineError::Store(_)
        )
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_retryability() {
        let integrity = EngineError::Envelope(EnvelopeError::IntegrityFailure);
        assert_eq!(integrity.code(), "IntegrityFailure");
        assert!(!integrity.is_retryable());

        assert_eq!(EngineError::Timeout.code(), "Timeout");
        assert!(EngineError::Timeout.is_retryable());

        let forbidden = EngineError::Forbidden("nope".to_string());
        assert_eq!(forbidden.code(), "Forbidden");
        assert!(!forbidden.is_retryable());
    }
}
