//! Request-scoped identity context.
//!
//! There is no ambient "current user" state: every call carries an opaque
//! access token, resolved to a verified identity through a
//! [`TokenValidator`], and the resulting [`AccessContext`] is threaded
//! through the operation explicitly.

use std::collections::HashMap;

use async_trait::async_trait;

use sealkit_core::Identity;

/// An opaque access token produced by the external login service.
///
/// The engine never inspects it; it only hands it to the validator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Request-scoped context: the verified identity behind one call.
#[derive(Debug, Clone)]
pub struct AccessContext {
    /// The verified identity claim.
    pub identity: Identity,

    /// Approximate network-origin-derived location, when the transport
    /// layer provides one. Recorded on audit events.
    pub source_location: Option<String>,
}

impl AccessContext {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            source_location: None,
        }
    }
}

/// Narrow interface to the external login service.
///
/// Login, registration, and email verification live elsewhere; the engine
/// only needs token -> identity.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Resolve a token to its verified identity, or `None` if the token is
    /// unknown, expired, or revoked.
    async fn identity_for(&self, token: &AccessToken) -> Option<Identity>;
}

/// A fixed token table. Useful for tests and embedded deployments.
#[derive(Default)]
pub struct StaticTokenValidator {
    tokens: HashMap<AccessToken, Identity>,
}

impl StaticTokenValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token for an identity, returning the token.
    pub fn issue(&mut self, token: impl Into<String>, identity: Identity) -> AccessToken {
        let token = AccessToken::new(token);
        self.tokens.insert(token.clone(), identity);
        token
    }
}

#[async_trait]
impl TokenValidator for StaticTokenValidator {
    async fn identity_for(&self, token: &AccessToken) -> Option<Identity> {
        self.tokens.get(token).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_validator() {
        let mut validator = StaticTokenValidator::new();
        let sara = Identity::parse("sara@example.com").unwrap();
        let token = validator.issue("tok-1", sara.clone());

        assert_eq!(validator.identity_for(&token).await, Some(sara));
        assert_eq!(
            validator.identity_for(&AccessToken::new("tok-2")).await,
            None
        );
    }
}
