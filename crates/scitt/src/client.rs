//! The Client: one ledger, one trust store, one configuration.
//!
//! The client wires the submission coordinator, the history enumerator and
//! the recovery coordinator to a shared ledger handle and a shared
//! [`TrustStore`]. Verification always runs against a pinned snapshot.

use std::path::PathBuf;
use std::sync::Arc;

use scitt_core::{Certificate, NetworkStatus, Receipt, SignedStatement, TransparentStatement, TxId};
use scitt_ledger::{
    CancelToken, ClaimCursor, Confirmation, History, Ledger, OperationId, PollConfig, Submission,
    Submitter,
};
use scitt_trust::{
    params, verify_transparent_statement, RecoveryCoordinator, RecoveryOutcome, ServiceParameters,
    TrustSnapshot, TrustStore, VerificationResult,
};

use crate::error::Result;

/// Configuration for the Client.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Status polling schedule for confirmations.
    pub poll: PollConfig,
    /// Roots trusted in every generation, alongside the service certificate.
    pub extra_roots: Vec<Certificate>,
    /// Directory of JSON service parameter files whose identities are
    /// added to `extra_roots` on connect.
    pub trust_dir: Option<PathBuf>,
}

impl ClientConfig {
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_extra_root(mut self, certificate: Certificate) -> Self {
        self.extra_roots.push(certificate);
        self
    }

    pub fn with_trust_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.trust_dir = Some(dir.into());
        self
    }
}

/// The main Client struct.
pub struct Client<L: Ledger> {
    ledger: Arc<L>,
    trust: Arc<TrustStore>,
    recovery: RecoveryCoordinator,
    submitter: Submitter<Arc<L>>,
    history: History<Arc<L>>,
    config: ClientConfig,
}

impl<L: Ledger> Client<L> {
    /// Connect to a ledger and trust its current service identity.
    pub async fn connect(ledger: L, config: ClientConfig) -> Result<Self> {
        let ledger = Arc::new(ledger);

        let mut extra_roots = config.extra_roots.clone();
        if let Some(dir) = &config.trust_dir {
            for parameters in params::load_dir(dir)? {
                extra_roots.push(parameters.certificate()?);
            }
        }

        let trust = Arc::new(TrustStore::empty());
        let recovery = RecoveryCoordinator::new(trust.clone()).with_extra_roots(extra_roots);
        let status = ledger.network_status().await?;
        recovery.bootstrap(&status);

        Ok(Self {
            submitter: Submitter::new(ledger.clone(), config.poll.clone()),
            history: History::new(ledger.clone()),
            ledger,
            trust,
            recovery,
            config,
        })
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn trust_store(&self) -> &Arc<TrustStore> {
        &self.trust
    }

    /// Pin the current trust generation.
    pub fn trust_snapshot(&self) -> Arc<TrustSnapshot> {
        self.trust.snapshot()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Submission
    // ─────────────────────────────────────────────────────────────────────────

    /// Submit without waiting for durability.
    pub async fn submit(&self, statement: &SignedStatement) -> Result<OperationId> {
        Ok(self.submitter.submit(statement).await?)
    }

    /// Resume polling a known operation.
    pub async fn confirm(&self, operation: &OperationId, cancel: &CancelToken) -> Result<Confirmation> {
        Ok(self.submitter.confirm(operation, cancel).await?)
    }

    /// Submit once and poll until the ledger confirms.
    pub async fn submit_and_confirm(
        &self,
        statement: &SignedStatement,
        cancel: &CancelToken,
    ) -> Result<Submission> {
        Ok(self.submitter.submit_and_confirm(statement, cancel).await?)
    }

    /// Submit, confirm, and return the encoded transparent statement.
    pub async fn register_signed_statement(
        &self,
        statement: &SignedStatement,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>> {
        Ok(self
            .submitter
            .register_signed_statement(statement, cancel)
            .await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────────

    /// Verify against the current trust generation.
    pub fn verify(&self, transparent: &[u8], original: &SignedStatement) -> Result<VerificationResult> {
        self.verify_with(transparent, &self.trust.snapshot(), original)
    }

    /// Verify against a previously pinned trust generation.
    pub fn verify_with(
        &self,
        transparent: &[u8],
        snapshot: &TrustSnapshot,
        original: &SignedStatement,
    ) -> Result<VerificationResult> {
        Ok(verify_transparent_statement(transparent, snapshot, original)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Trust
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn network_status(&self) -> Result<NetworkStatus> {
        Ok(self.ledger.network_status().await?)
    }

    /// Query the network status and replace the trust store if the service
    /// has recovered since the last observation.
    pub async fn refresh_trust(&self) -> Result<RecoveryOutcome> {
        let status = self.ledger.network_status().await?;
        Ok(self.recovery.observe(&status)?)
    }

    /// Add every identity the service has ever had to the trust store.
    pub async fn trust_historic_identities(&self) -> Result<Arc<TrustSnapshot>> {
        let historic = self.ledger.historic_service_parameters().await?;
        let historic = TrustSnapshot::from_service_parameters(0, &historic)?;
        let snapshot = self.trust.add_roots(historic.roots().cloned());
        tracing::info!(
            "Trusting {} historic service identities (generation {})",
            historic.len(),
            snapshot.generation()
        );
        Ok(snapshot)
    }

    pub async fn service_parameters(&self) -> Result<ServiceParameters> {
        Ok(self.ledger.service_parameters().await?)
    }

    pub async fn historic_service_parameters(&self) -> Result<Vec<ServiceParameters>> {
        Ok(self.ledger.historic_service_parameters().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // History
    // ─────────────────────────────────────────────────────────────────────────

    /// Lazily enumerate confirmed claims with seqno in `[start, end]`.
    pub fn enumerate_claims(&self, start: u64, end: u64) -> Result<ClaimCursor<'_, Arc<L>>> {
        Ok(self.history.enumerate_claims(start, end)?)
    }

    pub async fn get_claim(&self, tx: TxId) -> Result<SignedStatement> {
        Ok(self.history.get_claim(tx).await?)
    }

    pub async fn get_receipt(&self, tx: TxId) -> Result<Receipt> {
        Ok(self.history.get_receipt(tx).await?)
    }

    pub async fn get_transparent_statement(&self, tx: TxId) -> Result<TransparentStatement> {
        Ok(self.history.get_transparent_statement(tx).await?)
    }
}
