//! Proptest generators for property-based testing.

use proptest::prelude::*;
use std::sync::OnceLock;

use scitt_core::{Algorithm, Identity};

/// Generate a supported algorithm.
pub fn algorithm() -> impl Strategy<Value = Algorithm> {
    prop::sample::select(Algorithm::ALL.to_vec())
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// A process-wide identity per algorithm.
///
/// RSA key generation is too slow to run per case.
pub fn cached_identity(algorithm: Algorithm) -> &'static Identity {
    static IDENTITIES: OnceLock<Vec<Identity>> = OnceLock::new();
    let identities = IDENTITIES.get_or_init(|| {
        Algorithm::ALL
            .iter()
            .map(|&alg| {
                Identity::generate(alg, &format!("prop-{}", alg))
                    .unwrap_or_else(|e| panic!("generating {} identity: {}", alg, e))
            })
            .collect()
    });
    let index = Algorithm::ALL
        .iter()
        .position(|&alg| alg == algorithm)
        .unwrap_or_default();
    &identities[index]
}
