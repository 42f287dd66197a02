//! # Sealkit
//!
//! Policy-governed content protection: encrypt data once, then change who
//! may decrypt it - add members, revoke everyone but the author, or let
//! access lapse - without touching the already-distributed ciphertext.
//!
//! The [`Engine`] brings together the envelope codec, the authoritative
//! policy store, the authorization evaluator, and the append-only audit
//! trail into a cohesive interface:
//!
//! - [`Engine::encrypt`] / [`Engine::decrypt`] - seal and open envelopes
//! - [`Engine::set_policy`] - replace members/expiry on a live policy
//! - [`Engine::block_access`] / [`Engine::restore_access`] - revocation
//! - [`Engine::query_policy`] / [`Engine::query_events`] - inspection
//!
//! Identity arrives as an opaque, pre-validated access token resolved
//! through a [`TokenValidator`]; contact-level overrides come from a
//! [`ContactDirectory`]. Both are external collaborators consumed through
//! narrow traits.

pub mod contacts;
pub mod context;
pub mod engine;
pub mod error;

pub use contacts::{ContactDirectory, MemoryContacts, NoContacts};
pub use context::{AccessContext, AccessToken, StaticTokenValidator, TokenValidator};
pub use engine::{
    DecryptOutcome, Engine, EngineConfig, EncryptRequest, ExpiryUpdate, PolicyTarget,
    PolicyUpdate, ResolvedPolicy,
};
pub use error::{EngineError, Result};

pub use sealkit_core::{
    AccessEvent, ContactLevel, Decision, DenialReason, Identity, Outcome, Policy, PolicyBuilder,
    PolicyId, ResourcePolicyId, Role,
};
pub use sealkit_envelope::{Envelope, MasterKey};
pub use sealkit_store::{EventFilter, MemoryStore, SqliteStore, Store};
