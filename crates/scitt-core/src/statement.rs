//! Signed statements: COSE_Sign1 envelopes produced by the signature engine.

use bytes::Bytes;
use ciborium::value::Value;
use std::fmt;

use crate::algorithm::Algorithm;
use crate::canonical::{self, int};
use crate::certificate::Certificate;
use crate::cose::{headers, CoseSign1};
use crate::error::{CoreError, Result};
use crate::types::Sha256Hash;

/// A signed statement (claim).
///
/// Two statements are equal when their protected header, payload and
/// signature are byte-identical. The outer encoding (tagged or not) does not
/// take part.
#[derive(Clone)]
pub struct SignedStatement {
    encoded: Vec<u8>,
    protected: Vec<u8>,
    payload: Bytes,
    signature: Vec<u8>,
    algorithm: Algorithm,
    chain: Vec<Certificate>,
    content_type: Option<String>,
    issuer: Option<String>,
    feed: Option<String>,
}

impl SignedStatement {
    /// Parse a signed statement.
    ///
    /// Statements never carry unprotected headers; bytes that do are a
    /// transparent statement and must be parsed as one. The envelope is
    /// re-encoded in tagged canonical form so that [`digest`](Self::digest)
    /// does not depend on how the caller framed it.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let envelope = CoseSign1::from_bytes(bytes)?;
        if !envelope.unprotected.is_empty() {
            return Err(CoreError::malformed(
                "signed statement must not carry unprotected headers",
            ));
        }
        Self::from_parts(envelope.protected, envelope.payload, envelope.signature)
    }

    /// Build from the signed parts, re-encoding the envelope.
    pub(crate) fn from_parts(protected: Vec<u8>, payload: Vec<u8>, signature: Vec<u8>) -> Result<Self> {
        let envelope = CoseSign1 {
            protected,
            unprotected: Vec::new(),
            payload,
            signature,
        };
        let encoded = envelope.to_bytes()?;
        Self::from_envelope(envelope, encoded)
    }

    fn from_envelope(envelope: CoseSign1, encoded: Vec<u8>) -> Result<Self> {
        let header = envelope.protected_header()?;

        let alg_value = canonical::require(&header, &int(headers::ALG), "algorithm header")?;
        let alg_id = canonical::as_int(alg_value, "algorithm header")?;
        let algorithm = i64::try_from(alg_id)
            .ok()
            .and_then(Algorithm::from_cose_id)
            .ok_or_else(|| CoreError::UnsupportedAlgorithm(alg_id.to_string()))?;

        let chain = match canonical::require(&header, &int(headers::X5CHAIN), "x5chain header")? {
            Value::Bytes(b) => vec![Certificate::from_bytes(b)?],
            Value::Array(items) => items
                .iter()
                .map(|item| Certificate::from_bytes(canonical::as_bytes(item, "x5chain entry")?))
                .collect::<Result<Vec<_>>>()?,
            _ => return Err(CoreError::malformed("x5chain header: expected bytes or array")),
        };
        if chain.is_empty() {
            return Err(CoreError::malformed("x5chain header is empty"));
        }

        let optional_text = |label: i64, what: &str| -> Result<Option<String>> {
            canonical::map_get(&header, &int(label))
                .map(|v| canonical::as_text(v, what).map(str::to_string))
                .transpose()
        };

        Ok(Self {
            content_type: optional_text(headers::CONTENT_TYPE, "content type header")?,
            issuer: optional_text(headers::ISSUER, "issuer header")?,
            feed: optional_text(headers::FEED, "feed header")?,
            encoded,
            protected: envelope.protected,
            payload: Bytes::from(envelope.payload),
            signature: envelope.signature,
            algorithm,
            chain,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.encoded
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.encoded
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn protected_bytes(&self) -> &[u8] {
        &self.protected
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The signer's certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.chain[0]
    }

    pub fn certificate_chain(&self) -> &[Certificate] {
        &self.chain
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn feed(&self) -> Option<&str> {
        self.feed.as_deref()
    }

    /// SHA-256 of the encoded statement; the `data_hash` in a receipt leaf.
    pub fn digest(&self) -> Sha256Hash {
        Sha256Hash::hash(&self.encoded)
    }

    /// The envelope with the given unprotected header.
    pub(crate) fn envelope(&self, unprotected: Vec<(Value, Value)>) -> CoseSign1 {
        CoseSign1 {
            protected: self.protected.clone(),
            unprotected,
            payload: self.payload.to_vec(),
            signature: self.signature.clone(),
        }
    }

    /// Check the signature against the signer certificate's key.
    ///
    /// Structural problems (undecodable key, wrong signature length) are
    /// errors; a signature that simply does not verify is `Ok(false)`.
    pub fn verify_signature(&self) -> Result<bool> {
        let public_key = self.certificate().public_key()?;
        if public_key.key_type() != self.algorithm.key_type() {
            return Ok(false);
        }
        let to_be_signed = crate::cose::sig_structure(&self.protected, &self.payload)?;
        public_key.verify(self.algorithm, &to_be_signed, &self.signature)
    }
}

impl PartialEq for SignedStatement {
    fn eq(&self, other: &Self) -> bool {
        self.protected == other.protected
            && self.payload == other.payload
            && self.signature == other.signature
    }
}

impl Eq for SignedStatement {}

impl fmt::Debug for SignedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SignedStatement({}, {}, {} bytes)",
            self.algorithm,
            &self.digest().to_hex()[..16],
            self.payload.len()
        )
    }
}
