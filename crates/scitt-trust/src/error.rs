//! Error types for trust handling and receipt verification.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use scitt_core::{CoreError, Fingerprint};

/// Trust store loading and recovery consistency errors.
#[derive(Debug, Error)]
pub enum TrustError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid trust file {path}: {reason}")]
    InvalidTrustFile { path: PathBuf, reason: String },

    #[error("duplicate service id {0} in trust store")]
    DuplicateServiceId(String),

    #[error("service id {service_id} does not match certificate fingerprint {fingerprint}")]
    ServiceIdMismatch {
        service_id: String,
        fingerprint: String,
    },

    #[error("invalid service certificate: {0}")]
    InvalidCertificate(#[from] CoreError),

    #[error("recovery count went backwards: {previous} -> {observed}")]
    RecoveryCountRegression { previous: u64, observed: u64 },

    #[error("service certificate changed without a recovery (recovery count {recovery_count})")]
    CertificateChangedWithoutRecovery { recovery_count: u64 },

    #[error("recovery count advanced {previous} -> {observed} but the service certificate did not change")]
    RecoveryWithoutCertificateChange { previous: u64, observed: u64 },
}

impl TrustError {
    /// True for errors that mean the network reported contradictory state.
    pub fn is_inconsistent_network_state(&self) -> bool {
        matches!(
            self,
            TrustError::RecoveryCountRegression { .. }
                | TrustError::CertificateChangedWithoutRecovery { .. }
                | TrustError::RecoveryWithoutCertificateChange { .. }
        )
    }
}

/// The ordered checks of transparent statement verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationCheck {
    Parse,
    StatementMatch,
    InclusionProof,
    AnchorSignature,
    TrustedAnchor,
    StatementSignature,
}

impl VerificationCheck {
    /// All checks, in the order they run.
    pub const ORDER: [VerificationCheck; 6] = [
        VerificationCheck::Parse,
        VerificationCheck::StatementMatch,
        VerificationCheck::InclusionProof,
        VerificationCheck::AnchorSignature,
        VerificationCheck::TrustedAnchor,
        VerificationCheck::StatementSignature,
    ];
}

impl fmt::Display for VerificationCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VerificationCheck::Parse => "parse",
            VerificationCheck::StatementMatch => "statement match",
            VerificationCheck::InclusionProof => "inclusion proof",
            VerificationCheck::AnchorSignature => "anchor signature",
            VerificationCheck::TrustedAnchor => "trusted anchor",
            VerificationCheck::StatementSignature => "statement signature",
        };
        f.write_str(name)
    }
}

/// Transparent statement verification failures, one per check.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("malformed receipt: {0}")]
    MalformedReceipt(String),

    #[error("statement mismatch: {0}")]
    StatementMismatch(String),

    #[error("invalid inclusion proof: {0}")]
    InvalidInclusionProof(String),

    #[error("invalid anchor signature: {0}")]
    InvalidAnchorSignature(String),

    #[error("untrusted anchor {fingerprint} (trust generation {generation})")]
    UntrustedAnchor {
        fingerprint: Fingerprint,
        generation: u64,
    },

    #[error("invalid statement signature: {0}")]
    InvalidStatementSignature(String),
}

impl VerifyError {
    /// The check that failed.
    pub fn check(&self) -> VerificationCheck {
        match self {
            VerifyError::MalformedReceipt(_) => VerificationCheck::Parse,
            VerifyError::StatementMismatch(_) => VerificationCheck::StatementMatch,
            VerifyError::InvalidInclusionProof(_) => VerificationCheck::InclusionProof,
            VerifyError::InvalidAnchorSignature(_) => VerificationCheck::AnchorSignature,
            VerifyError::UntrustedAnchor { .. } => VerificationCheck::TrustedAnchor,
            VerifyError::InvalidStatementSignature(_) => VerificationCheck::StatementSignature,
        }
    }
}

pub type Result<T> = std::result::Result<T, TrustError>;
