//! Recovery handling: replace the trust store when the service recovers.
//!
//! A recovery gives the service a new identity and bumps its recovery
//! count. The coordinator watches [`NetworkStatus`] reports and swaps in a
//! fresh trust generation containing only the new service certificate and
//! any out-of-band roots it was configured with. Old and new service roots
//! are never merged; callers that still need a pre-recovery root re-add it
//! explicitly.

use std::sync::{Arc, Mutex};

use scitt_core::{Certificate, Fingerprint, NetworkStatus};

use crate::error::{Result, TrustError};
use crate::store::{TrustSnapshot, TrustStore};

/// What an observation did to the trust store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// First observation; the store now trusts the current service.
    Bootstrapped { generation: u64 },
    /// Nothing changed.
    Unchanged,
    /// A recovery happened and the store was replaced.
    Recovered {
        from: u64,
        to: u64,
        generation: u64,
    },
}

#[derive(Clone, Copy, Debug)]
struct Observed {
    recovery_count: u64,
    fingerprint: Fingerprint,
}

#[derive(Debug)]
pub struct RecoveryCoordinator {
    store: Arc<TrustStore>,
    extra_roots: Vec<Certificate>,
    last: Mutex<Option<Observed>>,
}

impl RecoveryCoordinator {
    pub fn new(store: Arc<TrustStore>) -> Self {
        Self {
            store,
            extra_roots: Vec::new(),
            last: Mutex::new(None),
        }
    }

    /// Roots trusted alongside the service certificate in every generation.
    pub fn with_extra_roots(mut self, roots: Vec<Certificate>) -> Self {
        self.extra_roots = roots;
        self
    }

    pub fn store(&self) -> &Arc<TrustStore> {
        &self.store
    }

    /// Last recovery count seen, if any.
    pub fn recovery_count(&self) -> Option<u64> {
        let last = *self.lock();
        last.map(|o| o.recovery_count)
    }

    /// Trust the service as currently reported, discarding prior roots.
    pub fn bootstrap(&self, status: &NetworkStatus) -> Arc<TrustSnapshot> {
        let mut last = self.lock();
        let snapshot = self.install(status);
        *last = Some(observed(status));
        tracing::info!(
            "Trust bootstrapped at recovery count {} (generation {})",
            status.recovery_count,
            snapshot.generation()
        );
        snapshot
    }

    /// Compare `status` with the last observation and react.
    ///
    /// The recovery count and the service certificate must change together,
    /// and the count never goes backwards. Anything else is reported as an
    /// inconsistent network state and leaves the store untouched.
    pub fn observe(&self, status: &NetworkStatus) -> Result<RecoveryOutcome> {
        let mut last = self.lock();
        let Some(previous) = *last else {
            let snapshot = self.install(status);
            *last = Some(observed(status));
            tracing::info!(
                "Trust bootstrapped at recovery count {} (generation {})",
                status.recovery_count,
                snapshot.generation()
            );
            return Ok(RecoveryOutcome::Bootstrapped {
                generation: snapshot.generation(),
            });
        };

        let current = observed(status);
        let cert_changed = current.fingerprint != previous.fingerprint;

        if current.recovery_count < previous.recovery_count {
            return Err(TrustError::RecoveryCountRegression {
                previous: previous.recovery_count,
                observed: current.recovery_count,
            });
        }
        if current.recovery_count == previous.recovery_count {
            if cert_changed {
                return Err(TrustError::CertificateChangedWithoutRecovery {
                    recovery_count: current.recovery_count,
                });
            }
            return Ok(RecoveryOutcome::Unchanged);
        }
        if !cert_changed {
            return Err(TrustError::RecoveryWithoutCertificateChange {
                previous: previous.recovery_count,
                observed: current.recovery_count,
            });
        }

        let snapshot = self.install(status);
        *last = Some(current);
        tracing::info!(
            "Service recovered: recovery count {} -> {}, trust generation {} now anchors {}",
            previous.recovery_count,
            current.recovery_count,
            snapshot.generation(),
            &current.fingerprint.to_hex()[..16]
        );
        Ok(RecoveryOutcome::Recovered {
            from: previous.recovery_count,
            to: current.recovery_count,
            generation: snapshot.generation(),
        })
    }

    fn install(&self, status: &NetworkStatus) -> Arc<TrustSnapshot> {
        let roots = std::iter::once(status.service_certificate.clone())
            .chain(self.extra_roots.iter().cloned());
        self.store.replace(roots)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Observed>> {
        self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn observed(status: &NetworkStatus) -> Observed {
    Observed {
        recovery_count: status.recovery_count,
        fingerprint: status.service_certificate.fingerprint(),
    }
}
