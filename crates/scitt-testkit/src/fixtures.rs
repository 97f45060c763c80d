//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use scitt_core::{sign, Algorithm, Certificate, CertificateInfo, Identity, PrivateKey, Result, SignedStatement};
use scitt_ledger::{MemoryLedgerConfig, PollConfig};

/// A certificate authority that issues identities for tests.
pub struct TestCa {
    identity: Identity,
    next_serial: AtomicU64,
}

impl TestCa {
    /// Create a CA with a self-signed root under `algorithm`.
    pub fn new(algorithm: Algorithm) -> Result<Self> {
        Ok(Self {
            identity: Identity::generate(algorithm, "test-ca")?,
            next_serial: AtomicU64::new(2),
        })
    }

    pub fn root(&self) -> &Certificate {
        self.identity.certificate()
    }

    /// Issue a fresh identity for `algorithm`. The chain is leaf then root.
    pub fn issue(&self, algorithm: Algorithm, subject: &str) -> Result<Identity> {
        let key = PrivateKey::generate_for(algorithm)?;
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let info = CertificateInfo::new(subject, self.root().subject(), serial, &key.public_key())?;
        let leaf = Certificate::issue(info, self.identity.key(), self.identity.algorithm())?;
        Identity::new(algorithm, key, vec![leaf, self.root().clone()])
    }

    /// One issued identity per supported algorithm, in table order.
    pub fn issue_all(&self) -> Result<Vec<Identity>> {
        Algorithm::ALL
            .iter()
            .map(|&alg| self.issue(alg, &format!("issuer-{}", alg)))
            .collect()
    }
}

/// JSON claim body `{"value": n}`.
pub fn claim_payload(value: u64) -> Vec<u8> {
    serde_json::json!({ "value": value }).to_string().into_bytes()
}

/// Sign `count` claims `{"value": 0..count}` with one identity.
pub fn signed_claims(identity: &Identity, count: u64) -> Result<Vec<SignedStatement>> {
    (0..count)
        .map(|value| sign(identity, &claim_payload(value)))
        .collect()
}

/// A ledger that confirms on the second status poll.
pub fn fast_ledger_config() -> MemoryLedgerConfig {
    MemoryLedgerConfig::default().with_commit_after_polls(1)
}

/// Short poll intervals and a short timeout.
pub fn fast_poll_config() -> PollConfig {
    PollConfig::default()
        .with_initial_interval(Duration::from_millis(5))
        .with_max_interval(Duration::from_millis(50))
        .with_timeout(Duration::from_secs(5))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scitt_trust::TrustSnapshot;

    #[test]
    fn test_issued_identity_chains_to_root() {
        let ca = TestCa::new(Algorithm::Es256).unwrap();
        let identity = ca.issue(Algorithm::Es512, "issuer").unwrap();

        assert_eq!(identity.chain().len(), 2);
        assert_eq!(identity.certificate().issuer(), "test-ca");
        assert!(identity.certificate().is_issued_by(ca.root()).unwrap());

        let trust = TrustSnapshot::new(1, [ca.root().clone()]);
        assert!(trust.is_trusted(identity.certificate()));
    }

    #[test]
    fn test_serials_are_unique() {
        let ca = TestCa::new(Algorithm::Es256).unwrap();
        let a = ca.issue(Algorithm::Es256, "a").unwrap();
        let b = ca.issue(Algorithm::Es256, "b").unwrap();
        assert_ne!(a.certificate().serial(), b.certificate().serial());
    }

    #[test]
    fn test_signed_claims() {
        let identity = Identity::generate(Algorithm::Es256, "issuer").unwrap();
        let claims = signed_claims(&identity, 3).unwrap();
        assert_eq!(claims.len(), 3);
        assert_eq!(&claims[2].payload()[..], &br#"{"value":2}"#[..]);
        for claim in &claims {
            assert!(claim.verify_signature().unwrap());
        }
    }
}
