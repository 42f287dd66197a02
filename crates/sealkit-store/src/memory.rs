//! In-memory implementation of the Store trait.
//!
//! Primarily for testing. Same semantics as SQLite but nothing persists
//! past drop. Thread-safe via RwLock.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use sealkit_core::{AccessEvent, Identity, Policy, PolicyId, ResourcePolicyId};

use crate::error::{Result, StoreError};
use crate::traits::{EventFilter, RegisterResult, Store};

/// In-memory store implementation.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Live policies by id.
    policies: HashMap<PolicyId, Policy>,

    /// Shared resource policies by rpid.
    shared: HashMap<ResourcePolicyId, Policy>,

    /// Append-only audit log, insertion order.
    events: Vec<AccessEvent>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn register_policy(
        &self,
        policy: &Policy,
        initial_event: &AccessEvent,
    ) -> Result<RegisterResult> {
        // One critical section: policy, shared publication, and event land
        // together or not at all.
        let mut inner = self.inner.write().unwrap();
        if inner.policies.contains_key(&policy.id()) {
            return Ok(RegisterResult::AlreadyExists);
        }
        inner.policies.insert(policy.id(), policy.clone());
        if let Some(rpid) = policy.rpid() {
            if !inner.shared.contains_key(rpid) {
                inner.shared.insert(rpid.clone(), policy.clone());
            }
        }
        inner.events.push(initial_event.clone());
        Ok(RegisterResult::Registered)
    }

    async fn get_policy(&self, id: &PolicyId) -> Result<Option<Policy>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.policies.get(id).cloned())
    }

    async fn replace_policy(&self, policy: &Policy) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        match inner.policies.get_mut(&policy.id()) {
            Some(slot) => {
                *slot = policy.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(policy.id().to_hex())),
        }
    }

    async fn list_policies_by_author(&self, author: &Identity) -> Result<Vec<PolicyId>> {
        let inner = self.inner.read().unwrap();
        let mut ids: Vec<PolicyId> = inner
            .policies
            .values()
            .filter(|p| p.author() == author)
            .map(|p| p.id())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn publish_shared_policy(
        &self,
        rpid: &ResourcePolicyId,
        policy: &Policy,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.shared.insert(rpid.clone(), policy.clone());
        Ok(())
    }

    async fn get_shared_policy(&self, rpid: &ResourcePolicyId) -> Result<Option<Policy>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.shared.get(rpid).cloned())
    }

    async fn append_event(&self, event: &AccessEvent) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.events.push(event.clone());
        Ok(())
    }

    async fn events_for_author(
        &self,
        author: &Identity,
        filter: &EventFilter,
    ) -> Result<Vec<AccessEvent>> {
        let inner = self.inner.read().unwrap();
        let limit = filter.limit.unwrap_or(usize::MAX);

        // Newest first: walk the append order backwards.
        let events = inner
            .events
            .iter()
            .rev()
            .filter(|e| {
                filter
                    .policy_id
                    .map_or(true, |id| e.policy_id == id)
            })
            .filter(|e| {
                inner
                    .policies
                    .get(&e.policy_id)
                    .map_or(false, |p| p.author() == author)
            })
            .take(limit)
            .cloned()
            .collect();
        Ok(events)
    }
}
