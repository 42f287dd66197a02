//! # Sealkit Store
//!
//! Storage abstraction for sealkit. Provides a trait-based interface for
//! the authoritative policy registry and the append-only audit log, with
//! SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`RegisterResult`] - Result of registering a policy
//! - [`EventFilter`] - Scope for audit queries
//!
//! ## Design Notes
//!
//! - **Ids are assigned once**: registering a policy under an existing id
//!   returns `AlreadyExists`; the stored policy is never clobbered by a
//!   re-registration.
//! - **Policies are never deleted**: content may outlive its last reachable
//!   policy, at which point it is permanently inaccessible by design.
//! - **Audit is append-only**: events are immutable, queryable in
//!   reverse-chronological order, scoped to the author of the referenced
//!   policy.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{EventFilter, RegisterResult, Store};
