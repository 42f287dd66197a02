//! # Sealkit Envelope
//!
//! The envelope codec: binds policy, ciphertext, and metadata into one
//! opaque distributable unit.
//!
//! ## Encryption Model
//!
//! Content uses a two-layer key model:
//!
//! 1. **Content Key**: a fresh ChaCha20-Poly1305 key per envelope encrypts
//!    the data, with the canonical policy bytes as associated data. The
//!    policy snapshot cannot be swapped onto different ciphertext
//!    undetected.
//! 2. **Key Wrap**: the content key travels inside the envelope wrapped
//!    under a key derived from the engine's master key and the policy id
//!    (blake3 derive_key). Only the engine releases it, and only after a
//!    successful authorization decision.
//!
//! Membership changes therefore never re-encrypt content: the ciphertext is
//! immutable, the authorization lives server-side.
//!
//! ## Integrity vs. authorization
//!
//! The embedded policy is the *integrity binding* (what was encrypted
//! against); the live policy fetched by the engine is the *authorization
//! binding*. Opening an envelope authenticates against the embedded copy
//! regardless of how the live policy has been mutated since.

pub mod crypto;
pub mod envelope;
pub mod error;

pub use crypto::{ContentKey, EnvelopeNonce, MasterKey};
pub use envelope::{Envelope, EnvelopeFormat, EnvelopeHeader};
pub use error::{EnvelopeError, Result};
