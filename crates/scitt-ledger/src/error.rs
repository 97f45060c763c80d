//! Error types for the ledger boundary, submission and history.

use std::time::Duration;
use thiserror::Error;

use scitt_core::TxId;

use crate::traits::OperationId;

/// Errors reported by a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("service busy: {0}")]
    Busy(String),

    #[error("not yet indexed: {0}")]
    NotYetIndexed(String),

    #[error("payload too large: {size} bytes exceeds limit of {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("operation {0} not found")]
    OperationNotFound(OperationId),

    #[error("operation {0} expired")]
    OperationExpired(OperationId),

    #[error("transaction {0} not found")]
    TxNotFound(TxId),

    #[error("transaction {0} is not yet committed")]
    TxNotCommitted(TxId),

    #[error("range {start}..={end} unavailable: ledger pruned below seqno {available_from}")]
    RangeUnavailable {
        start: u64,
        end: u64,
        available_from: u64,
    },

    #[error("internal ledger error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Errors worth retrying: the same request may succeed later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LedgerError::Unavailable(_) | LedgerError::Busy(_) | LedgerError::NotYetIndexed(_)
        )
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors from driving a submission to confirmation.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("statement error: {0}")]
    Statement(#[from] scitt_core::CoreError),

    #[error("operation {operation} rejected: {reason}")]
    Rejected {
        operation: OperationId,
        reason: String,
    },

    #[error("operation {operation} not confirmed within {waited:?}")]
    ConfirmationTimeout {
        operation: OperationId,
        waited: Duration,
        last_error: Option<String>,
    },

    #[error("confirmation of operation {0} cancelled")]
    Cancelled(OperationId),

    #[error("operation {operation} confirmed at {confirmed}, not after previously confirmed {previous}")]
    SequenceRegression {
        operation: OperationId,
        previous: TxId,
        confirmed: TxId,
    },

    #[error("operation {operation} confirmed at {status_tx} but its receipt is for {receipt_tx}")]
    ReceiptMismatch {
        operation: OperationId,
        status_tx: TxId,
        receipt_tx: TxId,
    },

    #[error("operation {operation} returned an invalid receipt: {reason}")]
    InvalidReceipt {
        operation: OperationId,
        reason: String,
    },
}

impl SubmitError {
    /// The operation the error concerns, when one was created.
    pub fn operation(&self) -> Option<&OperationId> {
        match self {
            SubmitError::Ledger(_) | SubmitError::Statement(_) => None,
            SubmitError::Rejected { operation, .. }
            | SubmitError::ConfirmationTimeout { operation, .. }
            | SubmitError::SequenceRegression { operation, .. }
            | SubmitError::ReceiptMismatch { operation, .. }
            | SubmitError::InvalidReceipt { operation, .. } => Some(operation),
            SubmitError::Cancelled(operation) => Some(operation),
        }
    }

    /// True when the ledger contradicted itself.
    pub fn is_consistency_error(&self) -> bool {
        matches!(
            self,
            SubmitError::SequenceRegression { .. } | SubmitError::ReceiptMismatch { .. }
        )
    }
}

/// Errors from history enumeration and lookups.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("invalid range: start {start} is after end {end}")]
    InvalidRange { start: u64, end: u64 },

    #[error("range {start}..={end} unavailable: ledger pruned below seqno {available_from}")]
    RangeUnavailable {
        start: u64,
        end: u64,
        available_from: u64,
    },

    #[error("transaction {0} not found")]
    NotFound(TxId),

    #[error("transaction {0} is not yet confirmed")]
    NotYetConfirmed(TxId),

    #[error("ledger returned {next} after {previous}")]
    OutOfOrder { previous: TxId, next: TxId },

    #[error("ledger returned {tx} outside requested range {start}..={end}")]
    OutOfRange { tx: TxId, start: u64, end: u64 },

    #[error("ledger cursor did not advance past seqno {0}")]
    StalledCursor(u64),

    #[error("invalid record at {tx}: {reason}")]
    InvalidRecord { tx: TxId, reason: String },

    #[error("ledger error: {0}")]
    Ledger(LedgerError),
}

impl HistoryError {
    /// True when the ledger contradicted the request or itself.
    pub fn is_consistency_error(&self) -> bool {
        matches!(
            self,
            HistoryError::RangeUnavailable { .. }
                | HistoryError::OutOfOrder { .. }
                | HistoryError::OutOfRange { .. }
                | HistoryError::StalledCursor(_)
        )
    }
}

impl From<LedgerError> for HistoryError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::TxNotFound(tx) => HistoryError::NotFound(tx),
            LedgerError::TxNotCommitted(tx) => HistoryError::NotYetConfirmed(tx),
            LedgerError::RangeUnavailable {
                start,
                end,
                available_from,
            } => HistoryError::RangeUnavailable {
                start,
                end,
                available_from,
            },
            other => HistoryError::Ledger(other),
        }
    }
}
