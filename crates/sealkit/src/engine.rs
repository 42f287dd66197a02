//! The Engine: unified API for policy-governed encryption.
//!
//! Brings together the envelope codec, the authoritative policy store, the
//! evaluator, and the audit log. Mutations to one policy are serialized per
//! governing key (the rpid when the unit is grouped, else the policy id);
//! decrypts read a consistent snapshot and proceed fully in parallel.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use sealkit_core::{
    evaluate, resolve_role, AccessEvent, Decision, DenialReason, Identity, Policy, PolicyBuilder,
    PolicyId, ResourcePolicyId, Role,
};
use sealkit_envelope::{Envelope, MasterKey};
use sealkit_store::{EventFilter, RegisterResult, Store};

use crate::contacts::ContactDirectory;
use crate::context::{AccessContext, AccessToken, TokenValidator};
use crate::error::{EngineError, Result};

/// Configuration for the Engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bound on each store or collaborator call. Exceeding it surfaces
    /// [`EngineError::Timeout`] instead of hanging.
    pub op_timeout: Duration,
    /// When true (the default), a failed audit append fails the operation.
    /// When false, the failure is logged and the operation proceeds.
    pub audit_required: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            op_timeout: Duration::from_secs(10),
            audit_required: true,
        }
    }
}

/// Caller-supplied inputs for one encrypt operation.
#[derive(Debug, Clone, Default)]
pub struct EncryptRequest {
    /// Members to authorize besides the author. The author is implicitly
    /// Owner; an explicit entry for the author is normalized to Owner.
    pub members: Vec<(Identity, Role)>,
    /// Optional expiry, Unix milliseconds.
    pub expiry: Option<i64>,
    /// Read-receipt recipients.
    pub notify: Vec<Identity>,
    /// User-friendly label (filename, subject line, anything).
    pub label: String,
    /// Original filename.
    pub filename: String,
    /// MIME type of the data.
    pub content_type: String,
    /// Opaque resource metadata.
    pub ruri: String,
    pub rid: String,
    pub rname: String,
    /// Link this unit to a shared resource policy.
    pub rpid: Option<ResourcePolicyId>,
}

/// Which live policy a mutation targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PolicyTarget {
    /// One encrypted unit's policy, by id.
    Id(PolicyId),
    /// The shared policy governing a resource-policy group.
    Group(ResourcePolicyId),
}

/// Changes applied by [`Engine::set_policy`]. Unset parts are kept.
#[derive(Debug, Clone, Default)]
pub struct PolicyUpdate {
    /// Replacement member map.
    pub members: Option<BTreeMap<Identity, Role>>,
    /// Expiry change.
    pub expiry: ExpiryUpdate,
}

/// Expiry change in a [`PolicyUpdate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExpiryUpdate {
    /// Leave the expiry as it is.
    #[default]
    Keep,
    /// Remove the expiry.
    Clear,
    /// Set a new expiry, Unix milliseconds.
    Set(i64),
}

/// Outcome of a decrypt call. Denials are normal outcomes, not errors.
#[derive(Debug)]
pub enum DecryptOutcome {
    /// Access granted: clear data plus the live policy that authorized it.
    Allowed {
        data: Vec<u8>,
        policy: Policy,
        role: Role,
    },
    /// Access denied with the evaluation's reason.
    Denied { reason: DenialReason },
}

impl DecryptOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, DecryptOutcome::Allowed { .. })
    }
}

/// A policy together with the requester's effective role, resolved fresh
/// for this call. The role is never persisted.
#[derive(Debug, Clone)]
pub struct ResolvedPolicy {
    pub policy: Policy,
    pub role: Role,
}

impl ResolvedPolicy {
    /// The wire document with the `role` field filled in.
    pub fn to_document(&self) -> sealkit_core::PolicyDocument {
        self.policy.to_document(Some(self.role))
    }
}

/// The main engine struct.
pub struct Engine<S: Store> {
    /// Master key protecting wrapped content keys. Never leaves the engine.
    master: MasterKey,
    /// The storage backend.
    store: Arc<S>,
    /// Token -> identity resolution (external login service).
    tokens: Arc<dyn TokenValidator>,
    /// Per-author contact overrides (external contact store).
    contacts: Arc<dyn ContactDirectory>,
    /// Configuration.
    config: EngineConfig,
    /// One mutation lock per governing key.
    locks: Mutex<HashMap<PolicyTarget, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S: Store> Engine<S> {
    /// Create a new engine instance.
    pub fn new(
        master: MasterKey,
        store: S,
        tokens: Arc<dyn TokenValidator>,
        contacts: Arc<dyn ContactDirectory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            master,
            store: Arc::new(store),
            tokens,
            contacts,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────
    // Encrypt / Decrypt
    // ─────────────────────────────────────────────────────────────────────

    /// Encrypt data under a fresh policy authored by the caller.
    ///
    /// Registers the policy with the authoritative store and returns the
    /// envelope all-or-nothing: on any failure nothing is distributed.
    /// When `rpid` is set and no shared policy exists yet, this policy is
    /// published as the group's shared policy.
    pub async fn encrypt(
        &self,
        token: &AccessToken,
        data: &[u8],
        request: EncryptRequest,
    ) -> Result<Envelope> {
        let ctx = self.authenticate(token).await?;

        let mut builder = PolicyBuilder::new(ctx.identity.clone())
            .members(request.members)
            .label(request.label)
            .filename(request.filename.clone())
            .ruri(request.ruri)
            .rid(request.rid)
            .rname(request.rname);
        if let Some(expiry) = request.expiry {
            builder = builder.expiry(expiry);
        }
        for recipient in request.notify {
            builder = builder.notify(recipient);
        }
        if let Some(rpid) = request.rpid.clone() {
            builder = builder.rpid(rpid);
        }
        let policy = builder.build()?;

        let envelope = Envelope::seal(
            data,
            &policy,
            &self.master,
            request.content_type,
            request.filename,
        )?;

        // Registration, the shared-policy publication, and the creation
        // event are one atomic store step: a failure leaves no trace.
        let mut event =
            AccessEvent::allowed(policy.id(), ctx.identity.clone(), now_millis(), Role::Owner);
        if let Some(location) = &ctx.source_location {
            event = event.with_source_location(location.clone());
        }
        match self
            .bounded(self.store.register_policy(&policy, &event))
            .await?
        {
            RegisterResult::Registered => {}
            // A 128-bit random id colliding means something is deeply wrong
            // with the entropy source; refuse rather than overwrite.
            RegisterResult::AlreadyExists => {
                return Err(EngineError::Unavailable("policy id collision".to_string()))
            }
        }

        info!(policy_id = %policy.id(), author = %ctx.identity, "sealed new content");
        Ok(envelope)
    }

    /// Decrypt an envelope for the caller.
    ///
    /// Authorization always reflects the live policy, not the snapshot
    /// embedded at encrypt time; integrity verification always uses the
    /// embedded snapshot. Exactly one audit event is appended regardless of
    /// outcome, durably, before this call returns.
    pub async fn decrypt(&self, token: &AccessToken, envelope: &Envelope) -> Result<DecryptOutcome> {
        let ctx = self.authenticate(token).await?;
        let resolved = self.resolve_live(envelope.policy()).await?;
        let contact = self.contact_level(resolved.author(), &ctx.identity).await?;

        let now = now_millis();
        let decision = evaluate(&resolved, &ctx.identity, contact, now);

        let event = match decision {
            Decision::Allowed(role) => {
                AccessEvent::allowed(resolved.id(), ctx.identity.clone(), now, role)
            }
            Decision::Denied(reason) => {
                AccessEvent::denied(resolved.id(), ctx.identity.clone(), now, reason)
            }
        };
        self.append_event(event, &ctx).await?;

        match decision {
            Decision::Allowed(role) => {
                let data = envelope.open(&self.master)?;
                debug!(policy_id = %resolved.id(), actor = %ctx.identity, %role, "access allowed");
                Ok(DecryptOutcome::Allowed {
                    data,
                    policy: resolved,
                    role,
                })
            }
            Decision::Denied(reason) => {
                debug!(policy_id = %resolved.id(), actor = %ctx.identity, %reason, "access denied");
                Ok(DecryptOutcome::Denied { reason })
            }
        }
    }

    /// Parse raw bytes as an envelope and decrypt.
    pub async fn decrypt_bytes(&self, token: &AccessToken, bytes: &[u8]) -> Result<DecryptOutcome> {
        let envelope = Envelope::from_bytes(bytes)?;
        self.decrypt(token, &envelope).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Policy Queries
    // ─────────────────────────────────────────────────────────────────────

    /// Query the live policy by id, with the caller's effective role.
    ///
    /// Denied evaluation maps to `Forbidden`: policy contents are only
    /// visible to principals who could decrypt.
    pub async fn query_policy(&self, token: &AccessToken, id: &PolicyId) -> Result<ResolvedPolicy> {
        let ctx = self.authenticate(token).await?;
        let stored = self
            .bounded(self.store.get_policy(id))
            .await?
            .ok_or_else(|| EngineError::NotFound(id.to_hex()))?;
        let live = self.resolve_live(&stored).await?;
        self.view_policy(live, &ctx).await
    }

    /// Query the policy governing an envelope.
    ///
    /// Resolves the live policy; the embedded snapshot is the advisory
    /// fallback when no authoritative copy is reachable.
    pub async fn query_policy_for_envelope(
        &self,
        token: &AccessToken,
        envelope: &Envelope,
    ) -> Result<ResolvedPolicy> {
        let ctx = self.authenticate(token).await?;
        let live = self.resolve_live(envelope.policy()).await?;
        self.view_policy(live, &ctx).await
    }

    async fn view_policy(&self, live: Policy, ctx: &AccessContext) -> Result<ResolvedPolicy> {
        let contact = self.contact_level(live.author(), &ctx.identity).await?;
        match evaluate(&live, &ctx.identity, contact, now_millis()) {
            Decision::Allowed(role) => Ok(ResolvedPolicy { policy: live, role }),
            Decision::Denied(reason) => Err(EngineError::Forbidden(reason.to_string())),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Policy Mutations
    // ─────────────────────────────────────────────────────────────────────

    /// Replace members and/or expiry on a live policy. Owner only.
    ///
    /// The replacement is atomic: concurrent decrypts observe the old or
    /// the new policy entirely, never a partial merge. The ciphertext of
    /// already-distributed envelopes is untouched.
    pub async fn set_policy(
        &self,
        token: &AccessToken,
        target: PolicyTarget,
        update: PolicyUpdate,
    ) -> Result<Policy> {
        let ctx = self.authenticate(token).await?;
        let lock = self.lock_handle(target.clone());
        let _guard = lock.lock().await;

        let mut policy = self.fetch_target(&target).await?;
        self.require_owner(&policy, &ctx).await?;

        if let Some(members) = update.members {
            policy.replace_members(members, &ctx.identity);
        }
        match update.expiry {
            ExpiryUpdate::Keep => {}
            ExpiryUpdate::Clear => policy.set_expiry(None, &ctx.identity),
            ExpiryUpdate::Set(ms) => {
                sealkit_core::policy::validate_expiry(ms)
                    .map_err(EngineError::InvalidPolicy)?;
                policy.set_expiry(Some(ms), &ctx.identity)
            }
        }

        self.write_target(&target, &policy).await?;
        info!(policy_id = %policy.id(), writer = %ctx.identity, "policy updated");
        Ok(policy)
    }

    /// Block access to everyone except the author. Owner or author.
    /// Idempotent: blocking already-blocked content succeeds.
    pub async fn block_access(&self, token: &AccessToken, target: PolicyTarget) -> Result<()> {
        let ctx = self.authenticate(token).await?;
        let lock = self.lock_handle(target.clone());
        let _guard = lock.lock().await;

        let mut policy = self.fetch_target(&target).await?;
        self.require_owner(&policy, &ctx).await?;

        policy.set_blocked(true, &ctx.identity);
        self.write_target(&target, &policy).await?;
        info!(policy_id = %policy.id(), actor = %ctx.identity, "access blocked");
        Ok(())
    }

    /// Revert to normal access evaluation. Author strictly: an Owner who is
    /// not the author cannot undo the author's revocation.
    pub async fn restore_access(&self, token: &AccessToken, target: PolicyTarget) -> Result<()> {
        let ctx = self.authenticate(token).await?;
        let lock = self.lock_handle(target.clone());
        let _guard = lock.lock().await;

        let mut policy = self.fetch_target(&target).await?;
        if ctx.identity != *policy.author() {
            return Err(EngineError::Forbidden(
                "only the author may restore access".to_string(),
            ));
        }

        policy.set_blocked(false, &ctx.identity);
        self.write_target(&target, &policy).await?;
        info!(policy_id = %policy.id(), actor = %ctx.identity, "access restored");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Audit Queries
    // ─────────────────────────────────────────────────────────────────────

    /// Query access events for content the caller authored, most recent
    /// first. A user may never audit content they merely accessed.
    pub async fn query_events(
        &self,
        token: &AccessToken,
        filter: EventFilter,
    ) -> Result<Vec<AccessEvent>> {
        let ctx = self.authenticate(token).await?;
        self.bounded(self.store.events_for_author(&ctx.identity, &filter))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    /// Resolve a token to a request context.
    async fn authenticate(&self, token: &AccessToken) -> Result<AccessContext> {
        let identity = timeout(self.config.op_timeout, self.tokens.identity_for(token))
            .await
            .map_err(|_| EngineError::Timeout)?
            .ok_or(EngineError::InvalidToken)?;
        Ok(AccessContext::new(identity))
    }

    /// Resolve the authoritative policy for an embedded snapshot.
    ///
    /// The shared policy under `rpid` wins when present; otherwise the
    /// latest registered copy by id; the embedded snapshot itself is an
    /// advisory default used only when the authority is unreachable.
    async fn resolve_live(&self, embedded: &Policy) -> Result<Policy> {
        if let Some(rpid) = embedded.rpid() {
            if let Some(shared) = self.bounded(self.store.get_shared_policy(rpid)).await? {
                return Ok(shared);
            }
        }
        if let Some(live) = self.bounded(self.store.get_policy(&embedded.id())).await? {
            return Ok(live);
        }
        Ok(embedded.clone())
    }

    /// Check that the actor's resolved role permits mutation.
    ///
    /// Role resolution for mutations ignores block and expiry: an Owner can
    /// administer content that is currently blocked or lapsed.
    async fn require_owner(&self, policy: &Policy, ctx: &AccessContext) -> Result<()> {
        let contact = self.contact_level(policy.author(), &ctx.identity).await?;
        match resolve_role(policy, &ctx.identity, contact) {
            Some(role) if role.can_mutate() => Ok(()),
            _ => Err(EngineError::Forbidden(
                "Owner role required for policy mutation".to_string(),
            )),
        }
    }

    async fn fetch_target(&self, target: &PolicyTarget) -> Result<Policy> {
        match target {
            PolicyTarget::Id(id) => self
                .bounded(self.store.get_policy(id))
                .await?
                .ok_or_else(|| EngineError::NotFound(id.to_hex())),
            PolicyTarget::Group(rpid) => self
                .bounded(self.store.get_shared_policy(rpid))
                .await?
                .ok_or_else(|| EngineError::NotFound(rpid.to_string())),
        }
    }

    async fn write_target(&self, target: &PolicyTarget, policy: &Policy) -> Result<()> {
        match target {
            PolicyTarget::Id(_) => self.bounded(self.store.replace_policy(policy)).await,
            PolicyTarget::Group(rpid) => {
                self.bounded(self.store.publish_shared_policy(rpid, policy))
                    .await
            }
        }
    }

    /// Append one audit event, durably, before the operation completes.
    async fn append_event(&self, mut event: AccessEvent, ctx: &AccessContext) -> Result<()> {
        if let Some(location) = &ctx.source_location {
            event = event.with_source_location(location.clone());
        }
        match self.bounded(self.store.append_event(&event)).await {
            Ok(()) => Ok(()),
            Err(e) if !self.config.audit_required => {
                warn!(policy_id = %event.policy_id, error = %e, "audit append failed");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Contact lookup with the operation timeout.
    async fn contact_level(
        &self,
        author: &Identity,
        contact: &Identity,
    ) -> Result<Option<sealkit_core::ContactLevel>> {
        timeout(
            self.config.op_timeout,
            self.contacts.level_for(author, contact),
        )
        .await
        .map_err(|_| EngineError::Timeout)
    }

    /// The mutation lock for one governing key.
    ///
    /// Entries nobody else holds are dropped first, so the map tracks keys
    /// under contention rather than every key ever mutated.
    fn lock_handle(&self, key: PolicyTarget) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(key).or_default().clone()
    }

    /// Run a store future with the operation timeout.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = sealkit_store::Result<T>>,
    ) -> Result<T> {
        match timeout(self.config.op_timeout, fut).await {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => Err(EngineError::Timeout),
        }
    }
}

/// Current time, Unix milliseconds.
fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
