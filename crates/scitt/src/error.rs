//! Error types for the client.

use scitt_core::CoreError;
use scitt_ledger::{HistoryError, LedgerError, SubmitError};
use scitt_trust::{TrustError, VerifyError};
use thiserror::Error;

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Malformed input or a signing failure.
    #[error("statement error: {0}")]
    Core(#[from] CoreError),

    /// Trust store loading or recovery consistency.
    #[error("trust error: {0}")]
    Trust(#[from] TrustError),

    /// One of the receipt checks failed.
    #[error("verification failed: {0}")]
    Verify(#[from] VerifyError),

    /// The ledger refused or failed a request.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("submission failed: {0}")]
    Submit(#[from] SubmitError),

    #[error("history error: {0}")]
    History(#[from] HistoryError),
}

impl ClientError {
    /// True when the ledger or network state contradicted itself.
    pub fn is_consistency_error(&self) -> bool {
        match self {
            ClientError::Trust(e) => e.is_inconsistent_network_state(),
            ClientError::Submit(e) => e.is_consistency_error(),
            ClientError::History(e) => e.is_consistency_error(),
            _ => false,
        }
    }

    /// True for failures that a later retry might not hit.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Ledger(e) => e.is_transient(),
            ClientError::Submit(SubmitError::Ledger(e)) => e.is_transient(),
            ClientError::Submit(SubmitError::ConfirmationTimeout { .. }) => true,
            _ => false,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
