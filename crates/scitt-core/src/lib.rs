//! # SCITT Core
//!
//! Pure primitives for the transparency client: the algorithm table, signed
//! statements, receipts and canonicalization.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Identity`] - A signer: algorithm, private key, certificate chain
//! - [`SignedStatement`] - A COSE_Sign1 claim produced by [`sign`]
//! - [`Receipt`] - Service signature over a Merkle root plus inclusion proof
//! - [`TransparentStatement`] - A statement with its receipts embedded
//! - [`TxId`] - Ledger position, `view.seqno`
//!
//! ## Canonicalization
//!
//! Everything signed or hashed is encoded as deterministic CBOR. See the
//! [`canonical`] module.

pub mod algorithm;
pub mod canonical;
pub mod certificate;
pub mod cose;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod merkle;
pub mod receipt;
pub mod signing;
pub mod statement;
pub mod transparent;
pub mod types;

pub use algorithm::{Algorithm, HashAlgorithm, KeyType};
pub use certificate::{Certificate, CertificateInfo};
pub use crypto::{PrivateKey, PublicKey};
pub use error::{CoreError, Result};
pub use identity::Identity;
pub use merkle::{MerkleTree, Side};
pub use receipt::{InclusionProof, Leaf, Receipt, SignedRoot};
pub use signing::{sign, sign_with, verify, SignOptions};
pub use statement::SignedStatement;
pub use transparent::TransparentStatement;
pub use types::{Fingerprint, NetworkStatus, Sha256Hash, TxId};
