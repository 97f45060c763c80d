//! # SCITT Testkit
//!
//! Testing utilities for the transparency client.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a test certificate authority, identities for every
//!   algorithm, claim payloads and fast ledger/poll configurations
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use scitt_testkit::generators::{algorithm, cached_identity, payload};
//!
//! proptest! {
//!     #[test]
//!     fn signed_statements_verify(alg in algorithm(), data in payload(256)) {
//!         let statement = scitt_core::sign(cached_identity(alg), &data).unwrap();
//!         prop_assert!(scitt_core::verify(statement.as_bytes()).unwrap());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use scitt_core::Algorithm;
//! use scitt_testkit::fixtures::TestCa;
//!
//! let ca = TestCa::new(Algorithm::Es256).unwrap();
//! let issuer = ca.issue(Algorithm::Es384, "issuer").unwrap();
//! assert!(issuer.certificate().is_issued_by(ca.root()).unwrap());
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{claim_payload, fast_ledger_config, fast_poll_config, signed_claims, TestCa};
pub use generators::{algorithm, cached_identity, payload};
