//! Compact certificates binding a subject name to a public key.
//!
//! Encoding: `[tbs bstr, signature alg, signature bstr]` where `tbs` is the
//! canonical CBOR map `{0: version, 1: serial, 2: subject, 3: key type,
//! 4: public key, 5: issuer}`. The signature covers the tbs bytes exactly as
//! carried, so a parsed certificate re-verifies without re-encoding.

use ciborium::value::Value;
use std::fmt;

use crate::algorithm::{Algorithm, KeyType};
use crate::canonical::{self, int, text};
use crate::crypto::{PrivateKey, PublicKey};
use crate::error::{CoreError, Result};
use crate::types::{Fingerprint, Sha256Hash};

pub const CERTIFICATE_VERSION: i64 = 1;

mod keys {
    pub const VERSION: i64 = 0;
    pub const SERIAL: i64 = 1;
    pub const SUBJECT: i64 = 2;
    pub const KEY_TYPE: i64 = 3;
    pub const PUBLIC_KEY: i64 = 4;
    pub const ISSUER: i64 = 5;
}

/// The signed body of a certificate.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CertificateInfo {
    pub serial: u64,
    pub subject: String,
    pub issuer: String,
    pub key_type: KeyType,
    /// SEC1 uncompressed point (EC) or SPKI DER (RSA).
    pub public_key: Vec<u8>,
}

impl CertificateInfo {
    pub fn new(subject: &str, issuer: &str, serial: u64, public_key: &PublicKey) -> Result<Self> {
        Ok(Self {
            serial,
            subject: subject.to_string(),
            issuer: issuer.to_string(),
            key_type: public_key.key_type(),
            public_key: public_key.to_bytes()?,
        })
    }

    fn to_value(&self) -> Value {
        Value::Map(vec![
            (int(keys::VERSION), int(CERTIFICATE_VERSION)),
            (int(keys::SERIAL), Value::Integer(self.serial.into())),
            (int(keys::SUBJECT), text(&self.subject)),
            (int(keys::KEY_TYPE), text(self.key_type.name())),
            (int(keys::PUBLIC_KEY), Value::Bytes(self.public_key.clone())),
            (int(keys::ISSUER), text(&self.issuer)),
        ])
    }

    fn from_value(value: &Value) -> Result<Self> {
        let map = canonical::as_map(value, "certificate body")?;

        let version = canonical::as_int(
            canonical::require(map, &int(keys::VERSION), "certificate version")?,
            "certificate version",
        )?;
        if version != CERTIFICATE_VERSION as i128 {
            return Err(CoreError::malformed(format!(
                "unsupported certificate version: {}",
                version
            )));
        }

        let serial = canonical::as_int(
            canonical::require(map, &int(keys::SERIAL), "certificate serial")?,
            "certificate serial",
        )?;
        let serial = u64::try_from(serial)
            .map_err(|_| CoreError::malformed("certificate serial out of range"))?;

        let key_type_name = canonical::as_text(
            canonical::require(map, &int(keys::KEY_TYPE), "certificate key type")?,
            "certificate key type",
        )?;
        let key_type = KeyType::from_name(key_type_name).ok_or_else(|| {
            CoreError::malformed(format!("unknown certificate key type: {}", key_type_name))
        })?;

        Ok(Self {
            serial,
            subject: canonical::as_text(
                canonical::require(map, &int(keys::SUBJECT), "certificate subject")?,
                "certificate subject",
            )?
            .to_string(),
            issuer: canonical::as_text(
                canonical::require(map, &int(keys::ISSUER), "certificate issuer")?,
                "certificate issuer",
            )?
            .to_string(),
            key_type,
            public_key: canonical::as_bytes(
                canonical::require(map, &int(keys::PUBLIC_KEY), "certificate public key")?,
                "certificate public key",
            )?
            .to_vec(),
        })
    }
}

/// A parsed certificate together with its exact encoding.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Certificate {
    encoded: Vec<u8>,
    tbs: Vec<u8>,
    info: CertificateInfo,
    signature_algorithm: Algorithm,
    signature: Vec<u8>,
    fingerprint: Fingerprint,
}

impl Certificate {
    /// Sign `info` with the issuer's key.
    pub fn issue(info: CertificateInfo, issuer_key: &PrivateKey, algorithm: Algorithm) -> Result<Self> {
        let tbs = canonical::to_canonical_bytes(&info.to_value())?;
        let signature = issuer_key.sign(algorithm, &tbs)?;
        let encoded = canonical::to_canonical_bytes(&Value::Array(vec![
            Value::Bytes(tbs.clone()),
            int(algorithm.cose_id()),
            Value::Bytes(signature.clone()),
        ]))?;
        Ok(Self {
            fingerprint: Sha256Hash::hash(&encoded),
            encoded,
            tbs,
            info,
            signature_algorithm: algorithm,
            signature,
        })
    }

    /// Self-signed certificate for `key`.
    pub fn self_signed(subject: &str, key: &PrivateKey, algorithm: Algorithm, serial: u64) -> Result<Self> {
        let info = CertificateInfo::new(subject, subject, serial, &key.public_key())?;
        Self::issue(info, key, algorithm)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let value = canonical::from_bytes(bytes)?;
        let parts = canonical::as_array(&value, "certificate")?;
        if parts.len() != 3 {
            return Err(CoreError::malformed(format!(
                "certificate must have 3 elements, got {}",
                parts.len()
            )));
        }

        let tbs = canonical::as_bytes(&parts[0], "certificate body")?.to_vec();
        let info = CertificateInfo::from_value(&canonical::from_bytes(&tbs)?)?;

        let alg_id = canonical::as_int(&parts[1], "certificate signature algorithm")?;
        let signature_algorithm = i64::try_from(alg_id)
            .ok()
            .and_then(Algorithm::from_cose_id)
            .ok_or_else(|| CoreError::UnsupportedAlgorithm(alg_id.to_string()))?;

        let signature = canonical::as_bytes(&parts[2], "certificate signature")?.to_vec();

        Ok(Self {
            encoded: bytes.to_vec(),
            fingerprint: Sha256Hash::hash(bytes),
            tbs,
            info,
            signature_algorithm,
            signature,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.encoded
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn info(&self) -> &CertificateInfo {
        &self.info
    }

    pub fn subject(&self) -> &str {
        &self.info.subject
    }

    pub fn issuer(&self) -> &str {
        &self.info.issuer
    }

    pub fn serial(&self) -> u64 {
        self.info.serial
    }

    pub fn signature_algorithm(&self) -> Algorithm {
        self.signature_algorithm
    }

    pub fn is_self_issued(&self) -> bool {
        self.info.subject == self.info.issuer
    }

    /// Decode the subject public key.
    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_bytes(self.info.key_type, &self.info.public_key)
    }

    /// Hex SHA-256 of the subject public key.
    pub fn kid(&self) -> String {
        Sha256Hash::hash(&self.info.public_key).to_hex()
    }

    /// Check the certificate signature with `issuer_key`.
    ///
    /// A key of the wrong family simply does not verify.
    pub fn verify_signed_by(&self, issuer_key: &PublicKey) -> Result<bool> {
        if issuer_key.key_type() != self.signature_algorithm.key_type() {
            return Ok(false);
        }
        issuer_key.verify(self.signature_algorithm, &self.tbs, &self.signature)
    }

    /// True when `issuer` is named as this certificate's issuer and its key
    /// produced the signature.
    pub fn is_issued_by(&self, issuer: &Certificate) -> Result<bool> {
        if self.info.issuer != issuer.info.subject {
            return Ok(false);
        }
        self.verify_signed_by(&issuer.public_key()?)
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Certificate({:?}, {})",
            self.info.subject,
            &self.fingerprint.to_hex()[..16]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_signed_roundtrip() {
        let key = PrivateKey::generate(KeyType::P256).unwrap();
        let cert = Certificate::self_signed("service", &key, Algorithm::Es256, 1).unwrap();
        assert!(cert.is_self_issued());
        assert!(cert.is_issued_by(&cert).unwrap());

        let parsed = Certificate::from_bytes(cert.as_bytes()).unwrap();
        assert_eq!(parsed, cert);
        assert_eq!(parsed.fingerprint(), Sha256Hash::hash(cert.as_bytes()));
        assert_eq!(parsed.kid(), key.public_key().kid().unwrap());
    }

    #[test]
    fn test_issued_by_ca() {
        let ca_key = PrivateKey::generate(KeyType::P384).unwrap();
        let ca = Certificate::self_signed("root", &ca_key, Algorithm::Es384, 1).unwrap();

        let leaf_key = PrivateKey::generate(KeyType::P256).unwrap();
        let info = CertificateInfo::new("leaf", "root", 2, &leaf_key.public_key()).unwrap();
        let leaf = Certificate::issue(info, &ca_key, Algorithm::Es384).unwrap();

        assert!(leaf.is_issued_by(&ca).unwrap());
        assert!(!leaf.is_issued_by(&leaf).unwrap());
        assert!(!ca.is_issued_by(&leaf).unwrap());
    }

    #[test]
    fn test_name_match_without_signature_is_rejected() {
        let ca_key = PrivateKey::generate(KeyType::P256).unwrap();
        let ca = Certificate::self_signed("root", &ca_key, Algorithm::Es256, 1).unwrap();

        let impostor_key = PrivateKey::generate(KeyType::P256).unwrap();
        let info = CertificateInfo::new("leaf", "root", 2, &impostor_key.public_key()).unwrap();
        let forged = Certificate::issue(info, &impostor_key, Algorithm::Es256).unwrap();

        assert!(!forged.is_issued_by(&ca).unwrap());
    }

    #[test]
    fn test_rsa_certificate() {
        let key = PrivateKey::generate(KeyType::Rsa).unwrap();
        let cert = Certificate::self_signed("rsa-service", &key, Algorithm::Ps384, 7).unwrap();
        let parsed = Certificate::from_bytes(cert.as_bytes()).unwrap();
        assert_eq!(parsed.info().key_type, KeyType::Rsa);
        assert_eq!(parsed.serial(), 7);
        assert!(parsed.verify_signed_by(&key.public_key()).unwrap());
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(Certificate::from_bytes(b"").is_err());
        assert!(Certificate::from_bytes(b"\x83\x01\x02").is_err());
        let truncated = {
            let key = PrivateKey::generate(KeyType::P256).unwrap();
            let cert = Certificate::self_signed("s", &key, Algorithm::Es256, 1).unwrap();
            cert.as_bytes()[..cert.as_bytes().len() - 5].to_vec()
        };
        assert!(Certificate::from_bytes(&truncated).is_err());
    }
}
