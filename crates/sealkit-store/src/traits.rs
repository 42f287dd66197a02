//! Store trait: the abstract interface for policy and audit persistence.
//!
//! This trait keeps the engine storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;

use sealkit_core::{AccessEvent, Identity, Policy, PolicyId, ResourcePolicyId};

use crate::error::Result;

/// Result of registering a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterResult {
    /// The policy was registered under a fresh id.
    Registered,
    /// A policy already exists under this id. The stored copy is untouched:
    /// ids are assigned exactly once and never overwritten by registration.
    AlreadyExists,
}

/// Scope for an audit query. An empty filter returns everything the
/// querying author may see.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Restrict to one policy.
    pub policy_id: Option<PolicyId>,
    /// Cap the number of events returned (most recent first).
    pub limit: Option<usize>,
}

impl EventFilter {
    /// Filter to a single policy.
    pub fn for_policy(policy_id: PolicyId) -> Self {
        Self {
            policy_id: Some(policy_id),
            limit: None,
        }
    }
}

/// The Store trait: async interface for policy and audit persistence.
///
/// # Design Notes
///
/// - **Registration is all-or-nothing**: `register_policy` writes the
///   policy, its shared-group publication, and the initial audit event in
///   one atomic step; a failure leaves no partially-registered policy.
///   Re-registering an id returns `AlreadyExists` without writing anything.
/// - **Replacement is whole-document**: `replace_policy` swaps the entire
///   stored policy atomically, so a concurrent reader sees the old or the
///   new document, never a partial merge.
/// - **Audit append is durable before return**: once `append_event`
///   resolves, the event survives; callers rely on this to guarantee no
///   silent event loss.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────
    // Policy Registry
    // ─────────────────────────────────────────────────────────────────────

    /// Register a newly created policy under its id, atomically.
    ///
    /// In the same step, publishes the policy as its group's shared policy
    /// when `rpid` is set and no shared policy exists yet, and appends the
    /// initial audit event. On `AlreadyExists` nothing is written.
    async fn register_policy(
        &self,
        policy: &Policy,
        initial_event: &AccessEvent,
    ) -> Result<RegisterResult>;

    /// Fetch the live policy by id.
    async fn get_policy(&self, id: &PolicyId) -> Result<Option<Policy>>;

    /// Replace a registered policy wholesale.
    ///
    /// Returns `NotFound` if no policy exists under the id.
    async fn replace_policy(&self, policy: &Policy) -> Result<()>;

    /// List ids of policies authored by the given identity.
    async fn list_policies_by_author(&self, author: &Identity) -> Result<Vec<PolicyId>>;

    // ─────────────────────────────────────────────────────────────────────
    // Shared Resource Policies
    // ─────────────────────────────────────────────────────────────────────

    /// Publish or replace the shared policy governing a resource-policy id.
    async fn publish_shared_policy(
        &self,
        rpid: &ResourcePolicyId,
        policy: &Policy,
    ) -> Result<()>;

    /// Fetch the live shared policy for a resource-policy id.
    async fn get_shared_policy(&self, rpid: &ResourcePolicyId) -> Result<Option<Policy>>;

    // ─────────────────────────────────────────────────────────────────────
    // Audit Log
    // ─────────────────────────────────────────────────────────────────────

    /// Append one audit event. Safe for unbounded concurrent writers.
    async fn append_event(&self, event: &AccessEvent) -> Result<()>;

    /// Query events for policies authored by the given identity, most
    /// recent first. A user may only audit content they authored.
    async fn events_for_author(
        &self,
        author: &Identity,
        filter: &EventFilter,
    ) -> Result<Vec<AccessEvent>>;
}
