//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::collections::HashMap;
use std::sync::Arc;

use sealkit::{
    AccessToken, Engine, EngineConfig, EncryptRequest, MemoryContacts, StaticTokenValidator,
};
use sealkit_core::{Identity, Role};
use sealkit_envelope::{Envelope, MasterKey};
use sealkit_store::MemoryStore;

/// A test fixture: an engine over a memory store with pre-issued tokens.
pub struct TestFixture {
    pub engine: Engine<MemoryStore>,
    tokens: HashMap<String, AccessToken>,
}

impl TestFixture {
    /// Create a fixture with a token issued for each user.
    pub fn new(users: &[&str]) -> Self {
        Self::with_contacts(users, MemoryContacts::new())
    }

    /// Create a fixture with pre-populated contact overrides.
    pub fn with_contacts(users: &[&str], contacts: MemoryContacts) -> Self {
        let mut validator = StaticTokenValidator::new();
        let mut tokens = HashMap::new();
        for user in users {
            let token = validator.issue(format!("tok-{}", user), parse_identity(user));
            tokens.insert((*user).to_string(), token);
        }
        let engine = Engine::new(
            MasterKey::generate(),
            MemoryStore::new(),
            Arc::new(validator),
            Arc::new(contacts),
            EngineConfig::default(),
        );
        Self { engine, tokens }
    }

    /// The token issued for a user. Panics if the user was not registered.
    pub fn token(&self, user: &str) -> AccessToken {
        self.tokens
            .get(user)
            .unwrap_or_else(|| panic!("no token issued for {}", user))
            .clone()
    }

    /// Encrypt data authored by `author` with the given member roles.
    pub async fn seal_for(
        &self,
        author: &str,
        data: &[u8],
        members: &[(&str, Role)],
    ) -> Envelope {
        let request = EncryptRequest {
            members: members
                .iter()
                .map(|(user, role)| (parse_identity(user), *role))
                .collect(),
            ..Default::default()
        };
        self.engine
            .encrypt(&self.token(author), data, request)
            .await
            .expect("seal_for failed")
    }
}

/// Parse a known-good identity string.
pub fn parse_identity(s: &str) -> Identity {
    Identity::parse(s).unwrap_or_else(|e| panic!("bad fixture identity {}: {}", s, e))
}
