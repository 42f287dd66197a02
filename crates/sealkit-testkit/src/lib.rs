//! # Sealkit Testkit
//!
//! Testing utilities for Sealkit.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known wire documents with expected parse results,
//!   for cross-implementation verification of the policy format
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helper structs for setting up engine test scenarios
//!
//! ## Golden Vectors
//!
//! Golden vectors pin the historical wire format:
//!
//! ```rust
//! use sealkit_testkit::vectors::{all_vectors, verify_all_vectors};
//!
//! for vector in all_vectors() {
//!     let policy = vector.parse().unwrap();
//!     println!("{}: {} members", vector.name, policy.members().len());
//! }
//! verify_all_vectors().unwrap();
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use sealkit_testkit::generators::{policy_from_params, PolicyParams};
//!
//! proptest! {
//!     #[test]
//!     fn wire_roundtrip(params: PolicyParams) {
//!         let policy = policy_from_params(&params);
//!         let doc = policy.to_document(None);
//!         prop_assert_eq!(
//!             sealkit_core::Policy::from_document(&doc).unwrap(),
//!             policy
//!         );
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! Quickly set up an engine with registered users:
//!
//! ```rust,ignore
//! use sealkit_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new(&["sara@example.com", "jon@example.com"]);
//! let envelope = fixture
//!     .seal_for("sara@example.com", b"data", &[("jon@example.com", Role::Viewer)])
//!     .await;
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::TestFixture;
pub use generators::{policy_from_params, PolicyParams};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
