//! The ledger boundary.
//!
//! The ledger orders, stores and anchors statements. Implementations may
//! talk HTTP to a real service or, like [`crate::memory::MemoryLedger`],
//! simulate one in process.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use scitt_core::{NetworkStatus, TxId};
use scitt_trust::ServiceParameters;

use crate::error::Result;

/// Opaque handle for an accepted submission.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OperationId({})", self.0)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a submission stands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionStatus {
    /// Accepted but not yet durably ordered.
    Pending,
    /// Durably ordered at `tx`; `receipt` is the encoded receipt.
    Confirmed { tx: TxId, receipt: Vec<u8> },
    /// The ledger refused the statement after accepting the request.
    Rejected { reason: String },
}

/// A page of claim transaction ids.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    /// Ascending transaction ids.
    pub tx_ids: Vec<TxId>,
    /// Seqno to resume from when the range has more entries.
    pub next: Option<u64>,
}

/// Ledger trait.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Submit encoded signed statement bytes. Exactly one request is made.
    async fn submit(&self, statement: &[u8]) -> Result<OperationId>;

    async fn submission_status(&self, operation: &OperationId) -> Result<SubmissionStatus>;

    async fn network_status(&self) -> Result<NetworkStatus>;

    /// Encoded signed statement recorded at `tx`.
    async fn claim(&self, tx: TxId) -> Result<Vec<u8>>;

    /// Encoded receipt for the statement at `tx`.
    async fn receipt(&self, tx: TxId) -> Result<Vec<u8>>;

    /// Claim transactions with seqno in `[start, end]`, one page at a time.
    async fn enumerate(&self, start: u64, end: u64) -> Result<Page>;

    /// Parameters of the current service identity.
    async fn service_parameters(&self) -> Result<ServiceParameters>;

    /// Parameters of every identity the service has had, current included.
    async fn historic_service_parameters(&self) -> Result<Vec<ServiceParameters>>;
}

#[async_trait]
impl<L: Ledger + ?Sized> Ledger for Arc<L> {
    async fn submit(&self, statement: &[u8]) -> Result<OperationId> {
        (**self).submit(statement).await
    }

    async fn submission_status(&self, operation: &OperationId) -> Result<SubmissionStatus> {
        (**self).submission_status(operation).await
    }

    async fn network_status(&self) -> Result<NetworkStatus> {
        (**self).network_status().await
    }

    async fn claim(&self, tx: TxId) -> Result<Vec<u8>> {
        (**self).claim(tx).await
    }

    async fn receipt(&self, tx: TxId) -> Result<Vec<u8>> {
        (**self).receipt(tx).await
    }

    async fn enumerate(&self, start: u64, end: u64) -> Result<Page> {
        (**self).enumerate(start, end).await
    }

    async fn service_parameters(&self) -> Result<ServiceParameters> {
        (**self).service_parameters().await
    }

    async fn historic_service_parameters(&self) -> Result<Vec<ServiceParameters>> {
        (**self).historic_service_parameters().await
    }
}
