//! Error types for sealkit core.

use thiserror::Error;

/// Core errors that can occur while building, parsing, or encoding policies.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("invalid role code: {0}")]
    InvalidRoleCode(String),

    #[error("invalid expiry: {0}")]
    InvalidExpiry(String),

    #[error("invalid policy id: {0}")]
    InvalidPolicyId(String),

    #[error("invalid resource policy id: {0}")]
    InvalidResourcePolicyId(String),

    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}
