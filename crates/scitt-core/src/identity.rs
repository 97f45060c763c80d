//! Signing identities: an algorithm, a private key and a certificate chain.

use std::fmt;

use crate::algorithm::Algorithm;
use crate::certificate::Certificate;
use crate::crypto::PrivateKey;
use crate::error::{CoreError, Result};

/// A signer. The first certificate in the chain is the signer's own.
///
/// The declared algorithm is not checked against the key here; signing with
/// a mismatched pair fails with [`CoreError::InvalidKey`].
#[derive(Clone)]
pub struct Identity {
    algorithm: Algorithm,
    key: PrivateKey,
    chain: Vec<Certificate>,
}

impl Identity {
    pub fn new(algorithm: Algorithm, key: PrivateKey, chain: Vec<Certificate>) -> Result<Self> {
        if chain.is_empty() {
            return Err(CoreError::malformed("identity needs at least one certificate"));
        }
        Ok(Self {
            algorithm,
            key,
            chain,
        })
    }

    /// Fresh key and self-signed certificate for `algorithm`.
    pub fn generate(algorithm: Algorithm, subject: &str) -> Result<Self> {
        let key = PrivateKey::generate_for(algorithm)?;
        let cert = Certificate::self_signed(subject, &key, algorithm, 1)?;
        Self::new(algorithm, key, vec![cert])
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn key(&self) -> &PrivateKey {
        &self.key
    }

    /// The signer's own certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.chain[0]
    }

    pub fn chain(&self) -> &[Certificate] {
        &self.chain
    }

    /// Sign raw bytes with the declared algorithm.
    pub fn sign_bytes(&self, message: &[u8]) -> Result<Vec<u8>> {
        if self.algorithm.key_type() != self.key.key_type() {
            return Err(CoreError::InvalidKey(format!(
                "identity declares {} but holds a {} key",
                self.algorithm,
                self.key.key_type()
            )));
        }
        self.key.sign(self.algorithm, message)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("algorithm", &self.algorithm)
            .field("certificate", self.certificate())
            .finish_non_exhaustive()
    }
}
