//! The closed table of signature algorithms.
//!
//! Each algorithm tag maps to exactly one key type and one digest. Adding an
//! algorithm means adding a variant and a row to [`ALGORITHMS`]; nothing else
//! dispatches on names or identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Signature algorithm tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "ES256")]
    Es256,
    #[serde(rename = "ES384")]
    Es384,
    #[serde(rename = "ES512")]
    Es512,
    #[serde(rename = "PS256")]
    Ps256,
    #[serde(rename = "PS384")]
    Ps384,
    #[serde(rename = "PS512")]
    Ps512,
}

/// Key family an algorithm requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    P256,
    P384,
    P521,
    Rsa,
}

/// Message digest used inside the signature routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Digest length in bytes. RSA-PSS uses it as the salt length.
    pub const fn output_len(self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }
}

/// One row of the algorithm table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmInfo {
    pub algorithm: Algorithm,
    pub name: &'static str,
    /// COSE algorithm identifier (IANA registry).
    pub cose_id: i64,
    pub key_type: KeyType,
    pub hash: HashAlgorithm,
}

pub static ALGORITHMS: [AlgorithmInfo; 6] = [
    AlgorithmInfo {
        algorithm: Algorithm::Es256,
        name: "ES256",
        cose_id: -7,
        key_type: KeyType::P256,
        hash: HashAlgorithm::Sha256,
    },
    AlgorithmInfo {
        algorithm: Algorithm::Es384,
        name: "ES384",
        cose_id: -35,
        key_type: KeyType::P384,
        hash: HashAlgorithm::Sha384,
    },
    AlgorithmInfo {
        algorithm: Algorithm::Es512,
        name: "ES512",
        cose_id: -36,
        key_type: KeyType::P521,
        hash: HashAlgorithm::Sha512,
    },
    AlgorithmInfo {
        algorithm: Algorithm::Ps256,
        name: "PS256",
        cose_id: -37,
        key_type: KeyType::Rsa,
        hash: HashAlgorithm::Sha256,
    },
    AlgorithmInfo {
        algorithm: Algorithm::Ps384,
        name: "PS384",
        cose_id: -38,
        key_type: KeyType::Rsa,
        hash: HashAlgorithm::Sha384,
    },
    AlgorithmInfo {
        algorithm: Algorithm::Ps512,
        name: "PS512",
        cose_id: -39,
        key_type: KeyType::Rsa,
        hash: HashAlgorithm::Sha512,
    },
];

impl Algorithm {
    pub const ALL: [Algorithm; 6] = [
        Algorithm::Es256,
        Algorithm::Es384,
        Algorithm::Es512,
        Algorithm::Ps256,
        Algorithm::Ps384,
        Algorithm::Ps512,
    ];

    /// The table row for this algorithm.
    pub fn info(self) -> &'static AlgorithmInfo {
        match self {
            Algorithm::Es256 => &ALGORITHMS[0],
            Algorithm::Es384 => &ALGORITHMS[1],
            Algorithm::Es512 => &ALGORITHMS[2],
            Algorithm::Ps256 => &ALGORITHMS[3],
            Algorithm::Ps384 => &ALGORITHMS[4],
            Algorithm::Ps512 => &ALGORITHMS[5],
        }
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn cose_id(self) -> i64 {
        self.info().cose_id
    }

    pub fn key_type(self) -> KeyType {
        self.info().key_type
    }

    pub fn hash(self) -> HashAlgorithm {
        self.info().hash
    }

    pub fn from_cose_id(id: i64) -> Option<Self> {
        ALGORITHMS
            .iter()
            .find(|row| row.cose_id == id)
            .map(|row| row.algorithm)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALGORITHMS
            .iter()
            .find(|row| row.name == name)
            .map(|row| row.algorithm)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::from_name(s).ok_or_else(|| CoreError::UnsupportedAlgorithm(s.to_string()))
    }
}

impl KeyType {
    /// Name used in certificates.
    pub const fn name(self) -> &'static str {
        match self {
            KeyType::P256 => "P-256",
            KeyType::P384 => "P-384",
            KeyType::P521 => "P-521",
            KeyType::Rsa => "RSA",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "P-256" => Some(KeyType::P256),
            "P-384" => Some(KeyType::P384),
            "P-521" => Some(KeyType::P521),
            "RSA" => Some(KeyType::Rsa),
            _ => None,
        }
    }

    /// Raw `r || s` length for ECDSA. RSA signatures follow the modulus.
    pub const fn fixed_signature_len(self) -> Option<usize> {
        match self {
            KeyType::P256 => Some(64),
            KeyType::P384 => Some(96),
            KeyType::P521 => Some(132),
            KeyType::Rsa => None,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_rows_match_variants() {
        for alg in Algorithm::ALL {
            assert_eq!(alg.info().algorithm, alg);
        }
    }

    #[test]
    fn test_cose_ids() {
        let ids: Vec<i64> = Algorithm::ALL.iter().map(|a| a.cose_id()).collect();
        assert_eq!(ids, vec![-7, -35, -36, -37, -38, -39]);
        for alg in Algorithm::ALL {
            assert_eq!(Algorithm::from_cose_id(alg.cose_id()), Some(alg));
        }
        assert_eq!(Algorithm::from_cose_id(-8), None);
    }

    #[test]
    fn test_name_roundtrip() {
        for alg in Algorithm::ALL {
            assert_eq!(alg.to_string().parse::<Algorithm>().unwrap(), alg);
        }
        assert!("RS256".parse::<Algorithm>().is_err());
        assert!("es256".parse::<Algorithm>().is_err());
    }

    #[test]
    fn test_key_and_hash_pairing() {
        assert_eq!(Algorithm::Es256.key_type(), KeyType::P256);
        assert_eq!(Algorithm::Es384.key_type(), KeyType::P384);
        assert_eq!(Algorithm::Es512.key_type(), KeyType::P521);
        assert_eq!(Algorithm::Es512.hash(), HashAlgorithm::Sha512);
        assert_eq!(Algorithm::Ps384.key_type(), KeyType::Rsa);
        assert_eq!(Algorithm::Ps384.hash().output_len(), 48);
    }
}
