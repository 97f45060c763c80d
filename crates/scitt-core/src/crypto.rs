//! Key material and the per-algorithm signature routines.
//!
//! ECDSA signatures are raw `r || s` (RFC 6979 deterministic nonces).
//! RSA-PSS uses MGF1 with the algorithm's digest and a salt as long as the
//! digest.

use rand::thread_rng;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Signer, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::digest::FixedOutputReset;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;

use crate::algorithm::{Algorithm, HashAlgorithm, KeyType};
use crate::error::{CoreError, Result};
use crate::types::Sha256Hash;

/// Modulus size for generated RSA keys.
pub const RSA_KEY_BITS: usize = 2048;

/// A signing key for one of the supported key types.
#[derive(Clone)]
pub enum PrivateKey {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
    P521(p521::ecdsa::SigningKey),
    Rsa(RsaPrivateKey),
}

impl PrivateKey {
    /// Generate a fresh key of the given type.
    pub fn generate(key_type: KeyType) -> Result<Self> {
        let mut rng = thread_rng();
        Ok(match key_type {
            KeyType::P256 => Self::P256(p256::ecdsa::SigningKey::random(&mut rng)),
            KeyType::P384 => Self::P384(p384::ecdsa::SigningKey::random(&mut rng)),
            KeyType::P521 => Self::P521(p521::ecdsa::SigningKey::random(&mut rng)),
            KeyType::Rsa => Self::Rsa(
                RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
                    .map_err(|e| CoreError::InvalidKey(e.to_string()))?,
            ),
        })
    }

    /// Generate a key suitable for `algorithm`.
    pub fn generate_for(algorithm: Algorithm) -> Result<Self> {
        Self::generate(algorithm.key_type())
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            Self::P256(_) => KeyType::P256,
            Self::P384(_) => KeyType::P384,
            Self::P521(_) => KeyType::P521,
            Self::Rsa(_) => KeyType::Rsa,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::P256(k) => PublicKey::P256(p256::ecdsa::VerifyingKey::from(k)),
            Self::P384(k) => PublicKey::P384(p384::ecdsa::VerifyingKey::from(k)),
            Self::P521(k) => PublicKey::P521(p521::ecdsa::VerifyingKey::from(k)),
            Self::Rsa(k) => PublicKey::Rsa(k.to_public_key()),
        }
    }

    /// Sign `message` under `algorithm`.
    ///
    /// Fails with [`CoreError::InvalidKey`] when the key type is not the one
    /// the algorithm requires.
    pub fn sign(&self, algorithm: Algorithm, message: &[u8]) -> Result<Vec<u8>> {
        let sign_err = |e: rsa::signature::Error| CoreError::InvalidKey(e.to_string());
        match (self, algorithm) {
            (Self::P256(k), Algorithm::Es256) => {
                let sig: p256::ecdsa::Signature = k.try_sign(message).map_err(sign_err)?;
                Ok(sig.to_bytes().to_vec())
            }
            (Self::P384(k), Algorithm::Es384) => {
                let sig: p384::ecdsa::Signature = k.try_sign(message).map_err(sign_err)?;
                Ok(sig.to_bytes().to_vec())
            }
            (Self::P521(k), Algorithm::Es512) => {
                let sig: p521::ecdsa::Signature = k.try_sign(message).map_err(sign_err)?;
                Ok(sig.to_bytes().to_vec())
            }
            (Self::Rsa(k), Algorithm::Ps256 | Algorithm::Ps384 | Algorithm::Ps512) => {
                match algorithm.hash() {
                    HashAlgorithm::Sha256 => pss_sign::<Sha256>(k, message),
                    HashAlgorithm::Sha384 => pss_sign::<Sha384>(k, message),
                    HashAlgorithm::Sha512 => pss_sign::<Sha512>(k, message),
                }
            }
            _ => Err(CoreError::InvalidKey(format!(
                "{} key cannot sign with {}",
                self.key_type(),
                algorithm
            ))),
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({}, [redacted])", self.key_type())
    }
}

fn pss_sign<D>(key: &RsaPrivateKey, message: &[u8]) -> Result<Vec<u8>>
where
    D: Digest + FixedOutputReset,
{
    let signing_key = rsa::pss::SigningKey::<D>::new(key.clone());
    let sig = signing_key
        .try_sign_with_rng(&mut thread_rng(), message)
        .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
    Ok(sig.to_vec())
}

/// A verification key for one of the supported key types.
#[derive(Clone)]
pub enum PublicKey {
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
    P521(p521::ecdsa::VerifyingKey),
    Rsa(RsaPublicKey),
}

// `p521::ecdsa::VerifyingKey` does not implement `Debug`, so this cannot be derived.
impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::P256(k) => f.debug_tuple("P256").field(k).finish(),
            Self::P384(k) => f.debug_tuple("P384").field(k).finish(),
            Self::P521(k) => f
                .debug_tuple("P521")
                .field(&k.to_encoded_point(false))
                .finish(),
            Self::Rsa(k) => f.debug_tuple("Rsa").field(k).finish(),
        }
    }
}

impl PublicKey {
    pub fn key_type(&self) -> KeyType {
        match self {
            Self::P256(_) => KeyType::P256,
            Self::P384(_) => KeyType::P384,
            Self::P521(_) => KeyType::P521,
            Self::Rsa(_) => KeyType::Rsa,
        }
    }

    /// Encoded form: SEC1 uncompressed point for EC keys, SPKI DER for RSA.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::P256(k) => Ok(k.to_encoded_point(false).as_bytes().to_vec()),
            Self::P384(k) => Ok(k.to_encoded_point(false).as_bytes().to_vec()),
            Self::P521(k) => Ok(k.to_encoded_point(false).as_bytes().to_vec()),
            Self::Rsa(k) => k
                .to_public_key_der()
                .map(|der| der.as_bytes().to_vec())
                .map_err(|e| CoreError::EncodingError(e.to_string())),
        }
    }

    pub fn from_bytes(key_type: KeyType, bytes: &[u8]) -> Result<Self> {
        let invalid = || CoreError::malformed(format!("invalid {} public key", key_type));
        match key_type {
            KeyType::P256 => p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map(Self::P256)
                .map_err(|_| invalid()),
            KeyType::P384 => p384::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map(Self::P384)
                .map_err(|_| invalid()),
            KeyType::P521 => p521::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map(Self::P521)
                .map_err(|_| invalid()),
            KeyType::Rsa => RsaPublicKey::from_public_key_der(bytes)
                .map(Self::Rsa)
                .map_err(|_| invalid()),
        }
    }

    /// Key identifier: hex SHA-256 of the encoded public key.
    pub fn kid(&self) -> Result<String> {
        Ok(Sha256Hash::hash(&self.to_bytes()?).to_hex())
    }

    /// Exact signature length this key produces.
    pub fn signature_len(&self) -> usize {
        match self {
            Self::Rsa(k) => k.size(),
            other => other.key_type().fixed_signature_len().unwrap_or_default(),
        }
    }

    /// Check `signature` over `message` under `algorithm`.
    ///
    /// A wrong signature length or a key that does not fit the algorithm is
    /// a structural error. Anything that parses but does not verify is
    /// `Ok(false)`.
    pub fn verify(&self, algorithm: Algorithm, message: &[u8], signature: &[u8]) -> Result<bool> {
        if algorithm.key_type() != self.key_type() {
            return Err(CoreError::malformed(format!(
                "{} key cannot verify {} signatures",
                self.key_type(),
                algorithm
            )));
        }
        if signature.len() != self.signature_len() {
            return Err(CoreError::malformed(format!(
                "{} signature must be {} bytes, got {}",
                algorithm,
                self.signature_len(),
                signature.len()
            )));
        }

        let valid = match self {
            Self::P256(k) => p256::ecdsa::Signature::from_slice(signature)
                .map(|sig| k.verify(message, &sig).is_ok())
                .unwrap_or(false),
            Self::P384(k) => p384::ecdsa::Signature::from_slice(signature)
                .map(|sig| k.verify(message, &sig).is_ok())
                .unwrap_or(false),
            Self::P521(k) => p521::ecdsa::Signature::from_slice(signature)
                .map(|sig| k.verify(message, &sig).is_ok())
                .unwrap_or(false),
            Self::Rsa(k) => match algorithm.hash() {
                HashAlgorithm::Sha256 => pss_verify::<Sha256>(k, message, signature),
                HashAlgorithm::Sha384 => pss_verify::<Sha384>(k, message, signature),
                HashAlgorithm::Sha512 => pss_verify::<Sha512>(k, message, signature),
            },
        };
        Ok(valid)
    }
}

fn pss_verify<D>(key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> bool
where
    D: Digest + FixedOutputReset,
{
    let verifying_key = rsa::pss::VerifyingKey::<D>::new(key.clone());
    match rsa::pss::Signature::try_from(signature) {
        Ok(sig) => verifying_key.verify(message, &sig).is_ok(),
        Err(_) => false,
    }
}
