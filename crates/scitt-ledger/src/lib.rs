//! # SCITT Ledger
//!
//! The ledger boundary and the client-side protocols that run against it.
//!
//! ## Overview
//!
//! The ledger orders signed statements, anchors them under signed Merkle
//! roots, and hands out receipts. This crate defines the [`Ledger`] trait
//! and builds two protocols on it:
//!
//! - **Submission**: submit once, poll with backoff until the ledger
//!   reports the entry durable ([`Submitter`])
//! - **History**: paged, validated enumeration of confirmed claims plus
//!   point lookups ([`History`])
//!
//! [`MemoryLedger`] simulates a service in process, including recovery,
//! pruning and transient faults.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scitt_core::{sign, Algorithm, Identity};
//! use scitt_ledger::{CancelToken, MemoryLedger, MemoryLedgerConfig, PollConfig, Submitter};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let ledger = MemoryLedger::new(MemoryLedgerConfig::default())?;
//!     let submitter = Submitter::new(ledger, PollConfig::default());
//!
//!     let identity = Identity::generate(Algorithm::Es256, "issuer")?;
//!     let statement = sign(&identity, br#"{"value":0}"#)?;
//!     let submission = submitter
//!         .submit_and_confirm(&statement, &CancelToken::new())
//!         .await?;
//!     println!("confirmed at {}", submission.tx);
//!     Ok(())
//! }
//! ```
//!
//! ## Submission Flow
//!
//! ```text
//! Client                              Ledger
//!   |-------- submit ----------------->|
//!   |<------- operation id ------------|
//!   |-------- status ----------------->|
//!   |<------- Pending -----------------|   (backoff, retry transient errors)
//!   |-------- status ----------------->|
//!   |<------- Confirmed(tx, receipt) --|
//! ```

pub mod error;
pub mod history;
pub mod memory;
pub mod submission;
pub mod traits;

pub use error::{HistoryError, LedgerError, Result, SubmitError};
pub use history::{ClaimCursor, History};
pub use memory::{MemoryLedger, MemoryLedgerConfig};
pub use submission::{CancelToken, Confirmation, PollConfig, Submission, Submitter};
pub use traits::{Ledger, OperationId, Page, SubmissionStatus};
