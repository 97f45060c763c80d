//! Receipts: a service signature over a Merkle root plus inclusion proofs.
//!
//! The protected header carries `1` alg, `4` kid, `33` anchor certificate,
//! `395` verifiable data structure and `"ccf.v1" {"txid"}` naming the
//! signature transaction. The payload is the 32-byte root the signature
//! covers. Each proof in unprotected `396 {-1: [..]}` is a bstr-wrapped map
//! `{1: [internal_hash, evidence, data_hash], 2: [[left, sibling], ..]}`.
//!
//! One signed root is shared by every entry committed under it; an entry's
//! own transaction id comes from its commit evidence, `ce:view.seqno:nonce`.

use ciborium::value::Value;
use std::fmt;

use crate::algorithm::Algorithm;
use crate::canonical::{self, int, text};
use crate::certificate::Certificate;
use crate::cose::{headers, CoseSign1};
use crate::error::{CoreError, Result};
use crate::identity::Identity;
use crate::merkle::{self, MerklePath, Side};
use crate::types::{Sha256Hash, TxId};

/// Verifiable data structure identifier for the SHA-256 ledger tree.
pub const VDS_CCF_TREE: i64 = 2;

const PROOF_LEAF: i64 = 1;
const PROOF_PATH: i64 = 2;
const EVIDENCE_PREFIX: &str = "ce";

// ─── Leaf ──────────────────────────────────────────────────────

/// The three components hashed into a ledger leaf.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leaf {
    pub internal_hash: Sha256Hash,
    pub internal_evidence: String,
    /// SHA-256 of the signed statement bytes.
    pub data_hash: Sha256Hash,
}

impl Leaf {
    /// Commit evidence for the entry at `tx`.
    pub fn evidence_for(tx: TxId, nonce: &[u8]) -> String {
        format!("{}:{}:{}", EVIDENCE_PREFIX, tx, hex::encode(nonce))
    }

    /// `SHA256(internal_hash || SHA256(evidence) || data_hash)`.
    pub fn digest(&self) -> Sha256Hash {
        let evidence_hash = Sha256Hash::hash(self.internal_evidence.as_bytes());
        Sha256Hash::hash_parts(&[
            &self.internal_hash.0[..],
            &evidence_hash.0[..],
            &self.data_hash.0[..],
        ])
    }

    /// The transaction named by the commit evidence.
    pub fn tx(&self) -> Result<TxId> {
        let mut parts = self.internal_evidence.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(EVIDENCE_PREFIX), Some(tx), Some(_nonce)) => tx.parse(),
            _ => Err(CoreError::malformed(format!(
                "invalid commit evidence: {:?}",
                self.internal_evidence
            ))),
        }
    }
}

// ─── Inclusion proof ───────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InclusionProof {
    pub leaf: Leaf,
    pub path: MerklePath,
}

impl InclusionProof {
    pub fn compute_root(&self) -> Sha256Hash {
        merkle::compute_root(self.leaf.digest(), &self.path)
    }

    fn to_value(&self) -> Value {
        let leaf = Value::Array(vec![
            Value::Bytes(self.leaf.internal_hash.0.to_vec()),
            text(&self.leaf.internal_evidence),
            Value::Bytes(self.leaf.data_hash.0.to_vec()),
        ]);
        let path = self
            .path
            .iter()
            .map(|(sibling, side)| {
                Value::Array(vec![
                    Value::Bool(*side == Side::Left),
                    Value::Bytes(sibling.0.to_vec()),
                ])
            })
            .collect();
        Value::Map(vec![(int(PROOF_LEAF), leaf), (int(PROOF_PATH), Value::Array(path))])
    }

    fn from_value(value: &Value) -> Result<Self> {
        let map = canonical::as_map(value, "inclusion proof")?;

        let leaf = canonical::as_array(canonical::require(map, &int(PROOF_LEAF), "proof leaf")?, "proof leaf")?;
        if leaf.len() != 3 {
            return Err(CoreError::malformed("proof leaf must have 3 elements"));
        }
        let leaf = Leaf {
            internal_hash: hash_from(&leaf[0], "leaf internal hash")?,
            internal_evidence: canonical::as_text(&leaf[1], "leaf evidence")?.to_string(),
            data_hash: hash_from(&leaf[2], "leaf data hash")?,
        };

        let steps = canonical::as_array(canonical::require(map, &int(PROOF_PATH), "proof path")?, "proof path")?;
        let path = steps
            .iter()
            .map(|step| {
                let step = canonical::as_array(step, "proof step")?;
                if step.len() != 2 {
                    return Err(CoreError::malformed("proof step must have 2 elements"));
                }
                let side = if canonical::as_bool(&step[0], "proof step side")? {
                    Side::Left
                } else {
                    Side::Right
                };
                Ok((hash_from(&step[1], "proof step hash")?, side))
            })
            .collect::<Result<MerklePath>>()?;

        Ok(Self { leaf, path })
    }
}

fn hash_from(value: &Value, what: &str) -> Result<Sha256Hash> {
    let bytes = canonical::as_bytes(value, what)?;
    Sha256Hash::try_from(bytes)
        .map_err(|_| CoreError::malformed(format!("{}: expected 32 bytes, got {}", what, bytes.len())))
}

// ─── Signed root ───────────────────────────────────────────────

/// A service signature over one tree root.
#[derive(Clone, Debug)]
pub struct SignedRoot {
    protected: Vec<u8>,
    root: Sha256Hash,
    signature: Vec<u8>,
}

impl SignedRoot {
    /// Sign `root` as the service at signature transaction `signature_tx`.
    pub fn sign(service: &Identity, signature_tx: TxId, root: Sha256Hash) -> Result<Self> {
        let anchor = service.certificate();
        let header = Value::Map(vec![
            (int(headers::ALG), int(service.algorithm().cose_id())),
            (int(headers::KID), Value::Bytes(anchor.kid().into_bytes())),
            (int(headers::X5CHAIN), Value::Bytes(anchor.as_bytes().to_vec())),
            (int(headers::VERIFIABLE_DATA_STRUCTURE), int(VDS_CCF_TREE)),
            (
                text(headers::CCF_V1),
                Value::Map(vec![(text(headers::TXID), text(&signature_tx.to_string()))]),
            ),
        ]);
        let protected = canonical::to_canonical_bytes(&header)?;
        let to_be_signed = crate::cose::sig_structure(&protected, root.as_bytes())?;
        let signature = service.sign_bytes(&to_be_signed)?;
        Ok(Self {
            protected,
            root,
            signature,
        })
    }

    pub fn root(&self) -> Sha256Hash {
        self.root
    }
}

// ─── Receipt ───────────────────────────────────────────────────

#[derive(Clone)]
pub struct Receipt {
    encoded: Vec<u8>,
    protected: Vec<u8>,
    algorithm: Algorithm,
    kid: String,
    anchor_certificate: Certificate,
    signature_tx: TxId,
    tx: TxId,
    root: Sha256Hash,
    proofs: Vec<InclusionProof>,
    signature: Vec<u8>,
}

impl Receipt {
    /// Attach an inclusion proof to a signed root.
    pub fn new(signed_root: &SignedRoot, proof: InclusionProof) -> Result<Self> {
        let proof_bytes = canonical::to_canonical_bytes(&proof.to_value())?;
        let envelope = CoseSign1 {
            protected: signed_root.protected.clone(),
            unprotected: vec![(
                int(headers::VERIFIABLE_DATA_PROOFS),
                Value::Map(vec![(
                    int(headers::INCLUSION_PROOFS),
                    Value::Array(vec![Value::Bytes(proof_bytes)]),
                )]),
            )],
            payload: signed_root.root.0.to_vec(),
            signature: signed_root.signature.clone(),
        };
        let encoded = envelope.to_bytes()?;
        Self::from_envelope(envelope, encoded)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let envelope = CoseSign1::from_bytes(bytes)?;
        Self::from_envelope(envelope, bytes.to_vec())
    }

    fn from_envelope(envelope: CoseSign1, encoded: Vec<u8>) -> Result<Self> {
        let header = envelope.protected_header()?;

        let alg_id = canonical::as_int(
            canonical::require(&header, &int(headers::ALG), "receipt algorithm")?,
            "receipt algorithm",
        )?;
        let algorithm = i64::try_from(alg_id)
            .ok()
            .and_then(Algorithm::from_cose_id)
            .ok_or_else(|| CoreError::UnsupportedAlgorithm(alg_id.to_string()))?;

        let kid = match canonical::require(&header, &int(headers::KID), "receipt kid")? {
            Value::Bytes(b) => String::from_utf8(b.clone())
                .map_err(|_| CoreError::malformed("receipt kid is not UTF-8"))?,
            Value::Text(s) => s.clone(),
            _ => return Err(CoreError::malformed("receipt kid: expected bytes or text")),
        };

        let anchor_certificate = match canonical::require(&header, &int(headers::X5CHAIN), "receipt certificate")? {
            Value::Bytes(b) => Certificate::from_bytes(b)?,
            Value::Array(items) if !items.is_empty() => {
                Certificate::from_bytes(canonical::as_bytes(&items[0], "receipt certificate")?)?
            }
            _ => return Err(CoreError::malformed("receipt certificate: expected bytes")),
        };

        let vds = canonical::as_int(
            canonical::require(&header, &int(headers::VERIFIABLE_DATA_STRUCTURE), "receipt tree type")?,
            "receipt tree type",
        )?;
        if vds != VDS_CCF_TREE as i128 {
            return Err(CoreError::malformed(format!("unsupported tree type: {}", vds)));
        }

        let ccf = canonical::as_map(
            canonical::require(&header, &text(headers::CCF_V1), "receipt ccf.v1 header")?,
            "receipt ccf.v1 header",
        )?;
        let signature_tx = canonical::as_text(
            canonical::require(ccf, &text(headers::TXID), "receipt txid")?,
            "receipt txid",
        )?
        .parse::<TxId>()?;

        let root = Sha256Hash::try_from(envelope.payload.as_slice())
            .map_err(|_| CoreError::malformed("receipt payload must be a 32-byte root"))?;

        let vdp = canonical::as_map(
            canonical::require(&envelope.unprotected, &int(headers::VERIFIABLE_DATA_PROOFS), "receipt proofs")?,
            "receipt proofs",
        )?;
        let proofs = canonical::as_array(
            canonical::require(vdp, &int(headers::INCLUSION_PROOFS), "inclusion proofs")?,
            "inclusion proofs",
        )?
        .iter()
        .map(|item| {
            let bytes = canonical::as_bytes(item, "inclusion proof")?;
            let proof = InclusionProof::from_value(&canonical::from_bytes(bytes)?)?;
            Ok((proof.leaf.tx()?, proof))
        })
        .collect::<Result<Vec<_>>>()?;
        let tx = match proofs.first() {
            Some((tx, _)) => *tx,
            None => return Err(CoreError::malformed("receipt carries no inclusion proof")),
        };
        if proofs.iter().any(|(other, _)| *other != tx) {
            return Err(CoreError::malformed("inclusion proofs name different transactions"));
        }
        let proofs = proofs.into_iter().map(|(_, proof)| proof).collect();

        Ok(Self {
            encoded,
            protected: envelope.protected,
            algorithm,
            kid,
            anchor_certificate,
            signature_tx,
            tx,
            root,
            proofs,
            signature: envelope.signature,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.encoded
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn anchor_certificate(&self) -> &Certificate {
        &self.anchor_certificate
    }

    /// The signature transaction that anchored the root.
    pub fn signature_tx(&self) -> TxId {
        self.signature_tx
    }

    /// The transaction of the entry this receipt proves.
    pub fn tx(&self) -> TxId {
        self.tx
    }

    pub fn root(&self) -> Sha256Hash {
        self.root
    }

    pub fn proofs(&self) -> &[InclusionProof] {
        &self.proofs
    }

    /// Check the anchor signature over the root.
    ///
    /// The kid must name the anchor certificate's key and the key must fit
    /// the algorithm; otherwise the signature does not verify.
    pub fn verify_anchor_signature(&self) -> Result<bool> {
        if self.kid != self.anchor_certificate.kid() {
            return Ok(false);
        }
        let public_key = self.anchor_certificate.public_key()?;
        if public_key.key_type() != self.algorithm.key_type() {
            return Ok(false);
        }
        let to_be_signed = crate::cose::sig_structure(&self.protected, self.root.as_bytes())?;
        public_key.verify(self.algorithm, &to_be_signed, &self.signature)
    }
}

impl fmt::Debug for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receipt")
            .field("tx", &self.tx())
            .field("signature_tx", &self.signature_tx)
            .field("algorithm", &self.algorithm)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Receipt {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

impl Eq for Receipt {}
