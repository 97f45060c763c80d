//! COSE_Sign1 envelopes shared by signed statements and receipts.

use ciborium::value::Value;

use crate::canonical::{self, text};
use crate::error::{CoreError, Result};

/// CBOR tag for COSE_Sign1.
pub const COSE_SIGN1_TAG: u64 = 18;

/// Header labels.
pub mod headers {
    pub const ALG: i64 = 1;
    pub const CONTENT_TYPE: i64 = 3;
    pub const KID: i64 = 4;
    pub const X5CHAIN: i64 = 33;
    pub const ISSUER: i64 = 391;
    pub const FEED: i64 = 392;
    pub const RECEIPTS: i64 = 394;
    pub const VERIFIABLE_DATA_STRUCTURE: i64 = 395;
    pub const VERIFIABLE_DATA_PROOFS: i64 = 396;
    pub const INCLUSION_PROOFS: i64 = -1;
    pub const CCF_V1: &str = "ccf.v1";
    pub const TXID: &str = "txid";
}

/// The four parts of a COSE_Sign1 structure.
#[derive(Clone, Debug, PartialEq)]
pub struct CoseSign1 {
    /// Serialized protected header map, kept byte-exact.
    pub protected: Vec<u8>,
    pub unprotected: Vec<(Value, Value)>,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl CoseSign1 {
    /// Parse a tagged or untagged COSE_Sign1.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let value = canonical::from_bytes(bytes)?;
        let inner = match value {
            Value::Tag(COSE_SIGN1_TAG, inner) => *inner,
            Value::Tag(tag, _) => {
                return Err(CoreError::malformed(format!("unexpected CBOR tag {}", tag)))
            }
            other => other,
        };
        let parts = canonical::as_array(&inner, "COSE_Sign1")?;
        if parts.len() != 4 {
            return Err(CoreError::malformed(format!(
                "COSE_Sign1 must have 4 elements, got {}",
                parts.len()
            )));
        }
        let payload = match &parts[2] {
            Value::Bytes(b) => b.clone(),
            Value::Null => return Err(CoreError::malformed("detached payloads are not supported")),
            _ => return Err(CoreError::malformed("COSE_Sign1 payload: expected byte string")),
        };
        Ok(Self {
            protected: canonical::as_bytes(&parts[0], "protected header")?.to_vec(),
            unprotected: canonical::as_map(&parts[1], "unprotected header")?.to_vec(),
            payload,
            signature: canonical::as_bytes(&parts[3], "signature")?.to_vec(),
        })
    }

    /// Tagged canonical encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        canonical::to_canonical_bytes(&Value::Tag(
            COSE_SIGN1_TAG,
            Box::new(Value::Array(vec![
                Value::Bytes(self.protected.clone()),
                Value::Map(self.unprotected.clone()),
                Value::Bytes(self.payload.clone()),
                Value::Bytes(self.signature.clone()),
            ])),
        ))
    }

    /// Decode the protected header map.
    pub fn protected_header(&self) -> Result<Vec<(Value, Value)>> {
        if self.protected.is_empty() {
            return Ok(Vec::new());
        }
        let value = canonical::from_bytes(&self.protected)?;
        Ok(canonical::as_map(&value, "protected header")?.to_vec())
    }

    /// Bytes the signature covers.
    pub fn to_be_signed(&self) -> Result<Vec<u8>> {
        sig_structure(&self.protected, &self.payload)
    }
}

/// `Sig_structure = ["Signature1", protected, external_aad = h'', payload]`.
pub fn sig_structure(protected: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
    canonical::to_canonical_bytes(&Value::Array(vec![
        text("Signature1"),
        Value::Bytes(protected.to_vec()),
        Value::Bytes(Vec::new()),
        Value::Bytes(payload.to_vec()),
    ]))
}
