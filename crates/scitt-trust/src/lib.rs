//! # SCITT Trust
//!
//! Trust roots and everything that consults them.
//!
//! - [`TrustStore`] holds immutable [`TrustSnapshot`] generations, swapped
//!   whole on change
//! - [`verify_transparent_statement`] runs the ordered receipt checks
//!   against a pinned snapshot
//! - [`RecoveryCoordinator`] replaces the store when the service recovers
//! - [`ServiceParameters`] and [`params::load_dir`] read file-based trust
//!   configuration

pub mod error;
pub mod params;
pub mod recovery;
pub mod store;
pub mod verify;

pub use error::{Result, TrustError, VerificationCheck, VerifyError};
pub use params::ServiceParameters;
pub use recovery::{RecoveryCoordinator, RecoveryOutcome};
pub use store::{TrustSnapshot, TrustStore};
pub use verify::{verify_transparent_statement, VerificationResult};
