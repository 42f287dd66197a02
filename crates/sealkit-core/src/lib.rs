//! # Sealkit Core
//!
//! Pure primitives for sealkit: policies, roles, identities, the
//! authorization evaluator, and canonical encoding.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over access-control documents.
//!
//! ## Key Types
//!
//! - [`Policy`] - The authorization document bound to one encrypted unit
//! - [`PolicyId`] - 128-bit random identifier assigned once at encryption
//! - [`Identity`] - A validated email address naming a principal
//! - [`Role`] - Owner, Editor, or Viewer
//! - [`AccessEvent`] - One immutable audit record
//!
//! ## Evaluation
//!
//! [`evaluate`] is a pure function of (policy, identity, contact override,
//! current time). The author always retains access; block and expiry deny
//! everyone else; contact overrides are consulted before membership.
//!
//! ## Canonicalization
//!
//! Policies are encoded with deterministic CBOR for the envelope's
//! integrity binding. See [`canonical`].

pub mod canonical;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod policy;
pub mod types;

pub use canonical::canonical_policy_bytes;
pub use error::CoreError;
pub use evaluator::{evaluate, resolve_role, Decision, DenialReason};
pub use event::{AccessEvent, Outcome};
pub use policy::{Policy, PolicyBuilder, PolicyDocument};
pub use types::{ContactLevel, Identity, PolicyId, ResourcePolicyId, Role};
