//! Contact directory: the external store of per-author overrides.
//!
//! Each author keeps contacts at one of three levels: Trust (delegate with
//! Owner-equivalent access to everything the author encrypts), Deny
//! (refused regardless of membership), or Allow (regular evaluation). The
//! directory itself is an external collaborator; the engine consults it
//! through this trait before membership lookup.

use std::collections::HashMap;

use async_trait::async_trait;

use sealkit_core::{ContactLevel, Identity};

/// Lookup interface to the contact store.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// The level `author` has assigned to `contact`, if any.
    async fn level_for(&self, author: &Identity, contact: &Identity) -> Option<ContactLevel>;
}

/// A directory with no overrides: every lookup falls through to membership.
pub struct NoContacts;

#[async_trait]
impl ContactDirectory for NoContacts {
    async fn level_for(&self, _author: &Identity, _contact: &Identity) -> Option<ContactLevel> {
        None
    }
}

/// An in-memory directory. Useful for tests and embedded deployments.
#[derive(Default)]
pub struct MemoryContacts {
    entries: HashMap<(Identity, Identity), ContactLevel>,
}

impl MemoryContacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the level `author` assigns to `contact`.
    pub fn set(&mut self, author: Identity, contact: Identity, level: ContactLevel) {
        self.entries.insert((author, contact), level);
    }
}

#[async_trait]
impl ContactDirectory for MemoryContacts {
    async fn level_for(&self, author: &Identity, contact: &Identity) -> Option<ContactLevel> {
        self.entries
            .get(&(author.clone(), contact.clone()))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(s: &str) -> Identity {
        Identity::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_memory_contacts() {
        let mut contacts = MemoryContacts::new();
        let sara = identity("sara@example.com");
        let delegate = identity("delegate@example.com");
        contacts.set(sara.clone(), delegate.clone(), ContactLevel::Trust);

        assert_eq!(
            contacts.level_for(&sara, &delegate).await,
            Some(ContactLevel::Trust)
        );
        // Levels are per-author, not global.
        assert_eq!(contacts.level_for(&delegate, &sara).await, None);
        assert_eq!(
            NoContacts.level_for(&sara, &delegate).await,
            None
        );
    }
}
