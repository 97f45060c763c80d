//! Transparent statement verification.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. parse the statement and its receipts
//! 2. the embedded statement is the one the caller submitted
//! 3. each inclusion proof commits to the statement and recomputes the root
//! 4. the anchor signature over the root verifies
//! 5. the anchor certificate is trusted by the pinned snapshot
//! 6. the statement's own signature verifies
//!
//! Verification is a pure function of its three inputs.

use scitt_core::{Fingerprint, Receipt, Sha256Hash, SignedStatement, TransparentStatement, TxId};

use crate::error::VerifyError;
use crate::store::TrustSnapshot;

/// A successfully verified transparent statement.
#[derive(Clone, Debug)]
pub struct VerificationResult {
    pub statement: SignedStatement,
    pub receipts: Vec<Receipt>,
    /// Transaction the statement was recorded at.
    pub tx: TxId,
    /// Trust generation the anchor was checked against.
    pub trust_generation: u64,
    /// Fingerprint of the anchor certificate of the first receipt.
    pub anchor: Fingerprint,
}

pub fn verify_transparent_statement(
    bytes: &[u8],
    trust: &TrustSnapshot,
    original: &SignedStatement,
) -> Result<VerificationResult, VerifyError> {
    let transparent = TransparentStatement::from_bytes(bytes)
        .map_err(|e| VerifyError::MalformedReceipt(e.to_string()))?;
    let (statement, receipts) = transparent.into_parts();

    if statement != *original {
        return Err(VerifyError::StatementMismatch(
            "embedded statement differs from the submitted one".into(),
        ));
    }

    let data_hash = statement.digest();
    for receipt in &receipts {
        check_inclusion(receipt, &data_hash)?;
    }

    for receipt in &receipts {
        match receipt.verify_anchor_signature() {
            Ok(true) => {}
            Ok(false) => {
                return Err(VerifyError::InvalidAnchorSignature(format!(
                    "signature over root {} does not verify",
                    receipt.root()
                )))
            }
            Err(e) => return Err(VerifyError::InvalidAnchorSignature(e.to_string())),
        }
    }

    for receipt in &receipts {
        let anchor = receipt.anchor_certificate();
        if !trust.is_trusted(anchor) {
            return Err(VerifyError::UntrustedAnchor {
                fingerprint: anchor.fingerprint(),
                generation: trust.generation(),
            });
        }
    }

    match statement.verify_signature() {
        Ok(true) => {}
        Ok(false) => {
            return Err(VerifyError::InvalidStatementSignature(
                "signature does not verify against the signer certificate".into(),
            ))
        }
        Err(e) => return Err(VerifyError::InvalidStatementSignature(e.to_string())),
    }

    let first = &receipts[0];
    Ok(VerificationResult {
        tx: first.tx(),
        anchor: first.anchor_certificate().fingerprint(),
        trust_generation: trust.generation(),
        statement,
        receipts,
    })
}

fn check_inclusion(receipt: &Receipt, data_hash: &Sha256Hash) -> Result<(), VerifyError> {
    for proof in receipt.proofs() {
        if proof.leaf.data_hash != *data_hash {
            return Err(VerifyError::InvalidInclusionProof(format!(
                "leaf at {} does not commit to this statement",
                receipt.tx()
            )));
        }
        let computed = proof.compute_root();
        if computed != receipt.root() {
            return Err(VerifyError::InvalidInclusionProof(format!(
                "computed root {} does not match anchored root {}",
                computed,
                receipt.root()
            )));
        }
    }
    Ok(())
}
