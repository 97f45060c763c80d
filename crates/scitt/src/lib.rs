//! # SCITT
//!
//! The unified client for a transparency service: sign statements, drive
//! them to ledger confirmation, verify receipts, and follow the service
//! through recoveries.
//!
//! ## Overview
//!
//! - **Statements**: COSE_Sign1 claims signed under ES256/384/512 or
//!   PS256/384/512
//! - **Submission**: submit once, poll until durable, get a receipt
//! - **Verification**: six ordered checks against a pinned trust snapshot
//! - **Recovery**: the trust store follows the service identity, never
//!   merging old and new roots
//! - **History**: ordered enumeration of confirmed claims
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scitt::{Client, ClientConfig};
//! use scitt::core::{sign, Algorithm, Identity};
//! use scitt::ledger::{CancelToken, MemoryLedger, MemoryLedgerConfig};
//!
//! async fn example() -> scitt::Result<()> {
//!     let ledger = MemoryLedger::new(MemoryLedgerConfig::default())?;
//!     let client = Client::connect(ledger, ClientConfig::default()).await?;
//!
//!     let identity = Identity::generate(Algorithm::Es256, "issuer")?;
//!     let statement = sign(&identity, br#"{"value":0}"#)?;
//!     let transparent = client
//!         .register_signed_statement(&statement, &CancelToken::new())
//!         .await?;
//!
//!     let result = client.verify(&transparent, &statement)?;
//!     println!("anchored at {}", result.tx);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `scitt::core` - Algorithms, keys, statements, receipts
//! - `scitt::trust` - Trust store, receipt verification, recovery
//! - `scitt::ledger` - Ledger boundary, submission, history

pub mod client;
pub mod error;

pub use scitt_core as core;
pub use scitt_ledger as ledger;
pub use scitt_trust as trust;

pub use client::{Client, ClientConfig};
pub use error::{ClientError, Result};

pub use scitt_core::{
    sign, sign_with, verify, Algorithm, Certificate, Identity, NetworkStatus, Receipt,
    SignOptions, SignedStatement, TransparentStatement, TxId,
};
pub use scitt_ledger::{CancelToken, Ledger, PollConfig, Submission};
pub use scitt_trust::{RecoveryOutcome, TrustSnapshot, TrustStore, VerificationResult};
