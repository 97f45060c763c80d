//! Trust store: immutable generations of trusted service roots.
//!
//! Readers take an `Arc` to the current [`TrustSnapshot`] and keep using it
//! for as long as they like. Writers build a complete new snapshot and swap
//! it in; a snapshot is never modified after it is published.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use scitt_core::{Certificate, Fingerprint};

use crate::error::Result;
use crate::params::{self, ServiceParameters};

/// One generation of trusted roots, keyed by certificate fingerprint.
#[derive(Clone, Debug, Default)]
pub struct TrustSnapshot {
    generation: u64,
    roots: BTreeMap<Fingerprint, Certificate>,
}

impl TrustSnapshot {
    pub fn new(generation: u64, roots: impl IntoIterator<Item = Certificate>) -> Self {
        Self {
            generation,
            roots: roots
                .into_iter()
                .map(|cert| (cert.fingerprint(), cert))
                .collect(),
        }
    }

    /// Trust every identity in `parameters`, e.g. a service's historic list.
    pub fn from_service_parameters(generation: u64, parameters: &[ServiceParameters]) -> Result<Self> {
        let roots = parameters
            .iter()
            .map(ServiceParameters::certificate)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(generation, roots))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.roots.contains_key(fingerprint)
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&Certificate> {
        self.roots.get(fingerprint)
    }

    /// Find a root by key identifier (hex SHA-256 of its public key).
    pub fn find_by_kid(&self, kid: &str) -> Option<&Certificate> {
        self.roots.values().find(|cert| cert.kid() == kid)
    }

    pub fn roots(&self) -> impl Iterator<Item = &Certificate> {
        self.roots.values()
    }

    /// A certificate is trusted when it is itself a root or was issued by one.
    pub fn is_trusted(&self, certificate: &Certificate) -> bool {
        self.contains(&certificate.fingerprint())
            || self
                .roots
                .values()
                .any(|root| certificate.is_issued_by(root).unwrap_or(false))
    }

    /// Same roots plus `certificates`, one generation later.
    fn with_roots(&self, certificates: impl IntoIterator<Item = Certificate>) -> Self {
        let mut roots = self.roots.clone();
        for certificate in certificates {
            roots.insert(certificate.fingerprint(), certificate);
        }
        Self {
            generation: self.generation + 1,
            roots,
        }
    }
}

/// Holder of the current trust generation.
#[derive(Debug, Default)]
pub struct TrustStore {
    current: RwLock<Arc<TrustSnapshot>>,
}

impl TrustStore {
    /// A store whose first generation trusts `roots`.
    pub fn new(roots: impl IntoIterator<Item = Certificate>) -> Self {
        Self::from_snapshot(TrustSnapshot::new(1, roots))
    }

    /// A store that trusts nothing (generation 0).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: TrustSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Load every service identity from a trust directory.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let parameters = params::load_dir(dir)?;
        let snapshot = TrustSnapshot::from_service_parameters(1, &parameters)?;
        tracing::info!(
            "Loaded trust store from {} ({} roots)",
            dir.display(),
            snapshot.len()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Pin the current generation.
    pub fn snapshot(&self) -> Arc<TrustSnapshot> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn generation(&self) -> u64 {
        self.snapshot().generation()
    }

    /// Replace all roots with `roots` as a new generation.
    pub fn replace(&self, roots: impl IntoIterator<Item = Certificate>) -> Arc<TrustSnapshot> {
        self.swap(|current| TrustSnapshot::new(current.generation + 1, roots))
    }

    /// Re-add a root to the current set as a new generation.
    pub fn add_root(&self, certificate: Certificate) -> Arc<TrustSnapshot> {
        self.add_roots([certificate])
    }

    /// Add `certificates` to whatever generation is current, as one new generation.
    pub fn add_roots(&self, certificates: impl IntoIterator<Item = Certificate>) -> Arc<TrustSnapshot> {
        self.swap(|current| current.with_roots(certificates))
    }

    fn swap(&self, build: impl FnOnce(&TrustSnapshot) -> TrustSnapshot) -> Arc<TrustSnapshot> {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = Arc::new(build(&current));
        tracing::debug!(
            "Trust store generation {} -> {} ({} roots)",
            current.generation,
            next.generation,
            next.len()
        );
        *current = next.clone();
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scitt_core::{Algorithm, CertificateInfo, Identity, PrivateKey};

    fn cert(subject: &str) -> Certificate {
        Identity::generate(Algorithm::Es256, subject)
            .unwrap()
            .certificate()
            .clone()
    }

    #[test]
    fn test_empty_store() {
        let store = TrustStore::empty();
        let snap = store.snapshot();
        assert_eq!(snap.generation(), 0);
        assert!(snap.is_empty());
        assert!(!snap.is_trusted(&cert("a")));
    }

    #[test]
    fn test_replace_bumps_generation_and_drops_old_roots() {
        let a = cert("a");
        let b = cert("b");
        let store = TrustStore::new([a.clone()]);
        let before = store.snapshot();

        let after = store.replace([b.clone()]);
        assert_eq!(after.generation(), before.generation() + 1);
        assert!(after.is_trusted(&b));
        assert!(!after.is_trusted(&a));

        // Pinned snapshot is unaffected
        assert!(before.is_trusted(&a));
        assert!(!before.is_trusted(&b));
        assert_eq!(store.generation(), after.generation());
    }

    #[test]
    fn test_add_root_copies_and_swaps() {
        let a = cert("a");
        let b = cert("b");
        let store = TrustStore::new([a.clone()]);
        let before = store.snapshot();
        let after = store.add_root(b.clone());
        assert!(after.is_trusted(&a) && after.is_trusted(&b));
        assert_eq!(before.len(), 1);
    }

    #[test]
    fn test_add_roots_builds_on_latest_generation() {
        let a = cert("a");
        let b = cert("b");
        let c = cert("c");
        let d = cert("d");
        let store = TrustStore::new([a.clone()]);
        let stale = store.snapshot();

        // A replacement lands between reading `stale` and adding roots.
        store.replace([b.clone()]);
        let after = store.add_roots([c.clone(), d.clone()]);

        assert_eq!(after.generation(), stale.generation() + 2);
        assert!(after.is_trusted(&b));
        assert!(after.is_trusted(&c) && after.is_trusted(&d));
        assert!(!after.is_trusted(&a));
    }

    #[test]
    fn test_issued_by_root_is_trusted() {
        let ca_key = PrivateKey::generate_for(Algorithm::Es384).unwrap();
        let ca = Certificate::self_signed("ca", &ca_key, Algorithm::Es384, 1).unwrap();
        let leaf_key = PrivateKey::generate_for(Algorithm::Es256).unwrap();
        let info = CertificateInfo::new("node", "ca", 2, &leaf_key.public_key()).unwrap();
        let leaf = Certificate::issue(info, &ca_key, Algorithm::Es384).unwrap();

        let snap = TrustSnapshot::new(1, [ca]);
        assert!(snap.is_trusted(&leaf));
        assert!(!snap.contains(&leaf.fingerprint()));
    }

    #[test]
    fn test_find_by_kid() {
        let a = cert("a");
        let snap = TrustSnapshot::new(1, [a.clone()]);
        assert_eq!(snap.find_by_kid(&a.kid()), Some(&a));
        assert!(snap.find_by_kid("00").is_none());
    }

    #[test]
    fn test_load_dir_builds_store() {
        let dir = tempfile::tempdir().unwrap();
        let id = Identity::generate(Algorithm::Es256, "service").unwrap();
        let params = ServiceParameters::from_certificate(id.certificate(), Algorithm::Es256);
        std::fs::write(
            dir.path().join("service.json"),
            serde_json::to_string(&params).unwrap(),
        )
        .unwrap();

        let store = TrustStore::load_dir(dir.path()).unwrap();
        assert!(store.snapshot().is_trusted(id.certificate()));
    }

    #[test]
    fn test_concurrent_readers_see_whole_generations() {
        let roots: Vec<Certificate> = (0..4).map(|i| cert(&format!("r{}", i))).collect();
        let store = Arc::new(TrustStore::new(roots[..2].to_vec()));

        let writer = {
            let store = store.clone();
            let roots = roots.clone();
            std::thread::spawn(move || {
                for i in 0..50 {
                    let pair = if i % 2 == 0 { &roots[2..] } else { &roots[..2] };
                    store.replace(pair.to_vec());
                }
            })
        };

        for _ in 0..200 {
            let snap = store.snapshot();
            assert_eq!(snap.len(), 2);
            let first_pair = snap.contains(&roots[0].fingerprint());
            assert_eq!(first_pair, snap.contains(&roots[1].fingerprint()));
        }
        writer.join().unwrap();
    }
}
