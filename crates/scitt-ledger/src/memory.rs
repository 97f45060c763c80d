//! A simulated ledger held in memory.
//!
//! Accepted statements get a transaction id immediately and become durable
//! after a configurable number of status polls. Durability commits every
//! pending entry at once and closes with a signature transaction: the
//! service signs the Merkle root over all committed leaves, and each newly
//! committed entry gets its receipt from that one signed root.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use scitt_core::{
    Algorithm, Identity, InclusionProof, Leaf, MerkleTree, NetworkStatus, Receipt, Sha256Hash,
    SignedRoot, SignedStatement, TxId,
};
use scitt_trust::ServiceParameters;

use crate::error::{LedgerError, Result};
use crate::traits::{Ledger, OperationId, Page, SubmissionStatus};

/// Largest statement the ledger accepts.
pub const MAX_ENTRY_SIZE_BYTES: usize = 1024 * 1024;

/// How long an operation can be queried after submission.
pub const DEFAULT_OPERATION_EXPIRY: Duration = Duration::from_secs(60 * 60);

/// Configuration for [`MemoryLedger`].
#[derive(Clone, Debug)]
pub struct MemoryLedgerConfig {
    pub max_entry_size: usize,
    /// Status polls answered `Pending` before an entry becomes durable.
    pub commit_after_polls: u32,
    pub operation_expiry: Duration,
    /// Transaction ids per enumeration page.
    pub page_size: usize,
    /// Algorithm of the service identity, kept across recoveries.
    pub service_algorithm: Algorithm,
    /// Statement algorithms the submission policy accepts. `None` accepts all.
    pub accepted_algorithms: Option<Vec<Algorithm>>,
    /// Issuers the submission policy accepts. `None` accepts any issuer,
    /// including none at all.
    pub accepted_issuers: Option<Vec<String>>,
}

impl Default for MemoryLedgerConfig {
    fn default() -> Self {
        Self {
            max_entry_size: MAX_ENTRY_SIZE_BYTES,
            commit_after_polls: 1,
            operation_expiry: DEFAULT_OPERATION_EXPIRY,
            page_size: 20,
            service_algorithm: Algorithm::Es256,
            accepted_algorithms: None,
            accepted_issuers: None,
        }
    }
}

impl MemoryLedgerConfig {
    pub fn with_max_entry_size(mut self, bytes: usize) -> Self {
        self.max_entry_size = bytes;
        self
    }

    pub fn with_commit_after_polls(mut self, polls: u32) -> Self {
        self.commit_after_polls = polls;
        self
    }

    pub fn with_operation_expiry(mut self, expiry: Duration) -> Self {
        self.operation_expiry = expiry;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_service_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.service_algorithm = algorithm;
        self
    }

    pub fn with_accepted_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.accepted_algorithms = Some(algorithms);
        self
    }

    pub fn with_accepted_issuers<I, S>(mut self, issuers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_issuers = Some(issuers.into_iter().map(Into::into).collect());
        self
    }
}

struct ClaimRecord {
    tx: TxId,
    statement: Vec<u8>,
    data_hash: Sha256Hash,
    receipt: Option<Vec<u8>>,
}

enum OperationState {
    Pending(TxId),
    Rejected(String),
}

struct Operation {
    created: Instant,
    polls: u32,
    state: OperationState,
}

struct State {
    service: Identity,
    recovery_count: u64,
    view: u64,
    next_seqno: u64,
    /// Leaf digests of every committed transaction, in seqno order.
    leaves: Vec<Sha256Hash>,
    claims: BTreeMap<u64, ClaimRecord>,
    uncommitted: Vec<u64>,
    operations: HashMap<OperationId, Operation>,
    historic: Vec<ServiceParameters>,
    pruned_before: u64,
    failing_status_calls: u32,
    next_operation: u64,
}

impl State {
    fn allocate_tx(&mut self) -> TxId {
        let tx = TxId::new(self.view, self.next_seqno);
        self.next_seqno += 1;
        tx
    }

    /// Make every pending entry durable under one signed root.
    fn commit(&mut self) -> Result<usize> {
        if self.uncommitted.is_empty() {
            return Ok(0);
        }

        let mut committed = Vec::new();
        for seqno in std::mem::take(&mut self.uncommitted) {
            let Some(record) = self.claims.get(&seqno) else {
                continue;
            };
            let tx_text = record.tx.to_string();
            let leaf = Leaf {
                internal_hash: Sha256Hash::hash_parts(&[
                    tx_text.as_bytes(),
                    &record.data_hash.0[..],
                ]),
                internal_evidence: Leaf::evidence_for(record.tx, &rand::random::<[u8; 32]>()),
                data_hash: record.data_hash,
            };
            committed.push((seqno, self.leaves.len(), leaf.clone()));
            self.leaves.push(leaf.digest());
        }

        let tree = MerkleTree::from_leaves(self.leaves.clone());
        let signature_tx = self.allocate_tx();
        let signed = SignedRoot::sign(&self.service, signature_tx, tree.root()).map_err(internal)?;

        let count = committed.len();
        for (seqno, index, leaf) in committed {
            let path = tree
                .proof(index)
                .ok_or_else(|| LedgerError::Internal(format!("no proof for leaf {}", index)))?;
            let receipt = Receipt::new(&signed, InclusionProof { leaf, path }).map_err(internal)?;
            if let Some(record) = self.claims.get_mut(&seqno) {
                record.receipt = Some(receipt.as_bytes().to_vec());
            }
        }

        let signature_tx_text = signature_tx.to_string();
        self.leaves.push(Sha256Hash::hash_parts(&[
            signature_tx_text.as_bytes(),
            &tree.root().0[..],
        ]));

        tracing::debug!(
            "Committed {} entries under signature transaction {}",
            count,
            signature_tx
        );
        Ok(count)
    }

    /// Whether `operation` was handed out by this ledger.
    fn issued(&self, operation: &OperationId) -> bool {
        operation
            .as_str()
            .strip_prefix("op-")
            .and_then(|n| n.parse::<u64>().ok())
            .map_or(false, |n| n > 0 && n < self.next_operation)
    }

    /// Forget operations older than `expiry`. Queries for them report expiry.
    fn sweep_operations(&mut self, expiry: Duration) {
        let before = self.operations.len();
        self.operations.retain(|_, op| op.created.elapsed() <= expiry);
        let swept = before - self.operations.len();
        if swept > 0 {
            tracing::debug!("Swept {} expired operations", swept);
        }
    }

    fn network_status(&self) -> NetworkStatus {
        NetworkStatus {
            service_certificate: self.service.certificate().clone(),
            recovery_count: self.recovery_count,
        }
    }
}

fn internal(e: scitt_core::CoreError) -> LedgerError {
    LedgerError::Internal(e.to_string())
}

/// In-memory ledger implementation.
pub struct MemoryLedger {
    config: MemoryLedgerConfig,
    state: RwLock<State>,
}

impl MemoryLedger {
    /// Create a ledger with a freshly generated service identity.
    pub fn new(config: MemoryLedgerConfig) -> Result<Self> {
        let service = Identity::generate(config.service_algorithm, "service-0").map_err(internal)?;
        let parameters = ServiceParameters::from_certificate(service.certificate(), config.service_algorithm);
        Ok(Self {
            state: RwLock::new(State {
                service,
                recovery_count: 0,
                view: 2,
                next_seqno: 1,
                leaves: Vec::new(),
                claims: BTreeMap::new(),
                uncommitted: Vec::new(),
                operations: HashMap::new(),
                historic: vec![parameters],
                pruned_before: 0,
                failing_status_calls: 0,
                next_operation: 1,
            }),
            config,
        })
    }

    pub fn config(&self) -> &MemoryLedgerConfig {
        &self.config
    }

    /// Make all pending entries durable now. Returns how many were committed.
    pub async fn commit(&self) -> Result<usize> {
        self.state.write().await.commit()
    }

    /// Simulate disaster recovery.
    ///
    /// Pending work is committed under the old identity first. The service
    /// then gets a new identity, the recovery count and view advance, and
    /// the new identity joins the historic parameters.
    pub async fn restart(&self) -> Result<NetworkStatus> {
        let mut state = self.state.write().await;
        state.commit()?;

        let next_count = state.recovery_count + 1;
        let service = Identity::generate(
            self.config.service_algorithm,
            &format!("service-{}", next_count),
        )
        .map_err(internal)?;
        state.historic.push(ServiceParameters::from_certificate(
            service.certificate(),
            self.config.service_algorithm,
        ));
        state.service = service;
        state.recovery_count = next_count;
        state.view += 1;

        tracing::info!(
            "Ledger recovered: recovery count {}, view {}",
            state.recovery_count,
            state.view
        );
        Ok(state.network_status())
    }

    /// Drop history below `before_seqno` from enumeration.
    pub async fn prune(&self, before_seqno: u64) {
        let mut state = self.state.write().await;
        state.pruned_before = state.pruned_before.max(before_seqno);
    }

    /// Make the next `count` status queries fail as unavailable.
    pub async fn fail_next_status_calls(&self, count: u32) {
        self.state.write().await.failing_status_calls = count;
    }

    /// Entries accepted but not yet durable.
    pub async fn pending_count(&self) -> usize {
        self.state.read().await.uncommitted.len()
    }

    fn policy_rejection(&self, statement: &SignedStatement) -> Option<String> {
        if let Some(accepted) = &self.config.accepted_algorithms {
            if !accepted.contains(&statement.algorithm()) {
                return Some(format!(
                    "algorithm {} is not accepted by the service policy",
                    statement.algorithm()
                ));
            }
        }
        if let Some(accepted) = &self.config.accepted_issuers {
            match statement.issuer() {
                None => return Some("statement has no issuer".into()),
                Some(issuer) if !accepted.iter().any(|a| a == issuer) => {
                    return Some(format!(
                        "issuer {} is not accepted by the service policy",
                        issuer
                    ))
                }
                Some(_) => {}
            }
        }
        match statement.verify_signature() {
            Ok(true) => None,
            Ok(false) => Some("statement signature does not verify".into()),
            Err(e) => Some(format!("statement signature cannot be checked: {}", e)),
        }
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn submit(&self, statement: &[u8]) -> Result<OperationId> {
        if statement.len() > self.config.max_entry_size {
            return Err(LedgerError::PayloadTooLarge {
                size: statement.len(),
                limit: self.config.max_entry_size,
            });
        }
        let parsed = SignedStatement::from_bytes(statement)
            .map_err(|e| LedgerError::InvalidInput(e.to_string()))?;
        let rejection = self.policy_rejection(&parsed);

        let mut state = self.state.write().await;
        state.sweep_operations(self.config.operation_expiry);
        let operation = OperationId::new(format!("op-{:06}", state.next_operation));
        state.next_operation += 1;

        let op_state = match rejection {
            Some(reason) => {
                tracing::warn!("Rejecting submission {}: {}", operation, reason);
                OperationState::Rejected(reason)
            }
            None => {
                let tx = state.allocate_tx();
                state.claims.insert(
                    tx.seqno,
                    ClaimRecord {
                        tx,
                        statement: parsed.as_bytes().to_vec(),
                        data_hash: parsed.digest(),
                        receipt: None,
                    },
                );
                state.uncommitted.push(tx.seqno);
                tracing::debug!("Accepted submission {} at {}", operation, tx);
                OperationState::Pending(tx)
            }
        };
        state.operations.insert(
            operation.clone(),
            Operation {
                created: Instant::now(),
                polls: 0,
                state: op_state,
            },
        );
        Ok(operation)
    }

    async fn submission_status(&self, operation: &OperationId) -> Result<SubmissionStatus> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        if state.failing_status_calls > 0 {
            state.failing_status_calls -= 1;
            return Err(LedgerError::Unavailable("injected fault".into()));
        }

        let expired = match state.operations.get(operation) {
            Some(op) => op.created.elapsed() > self.config.operation_expiry,
            None if state.issued(operation) => true,
            None => return Err(LedgerError::OperationNotFound(operation.clone())),
        };
        if expired {
            state.operations.remove(operation);
            return Err(LedgerError::OperationExpired(operation.clone()));
        }
        let op = state
            .operations
            .get_mut(operation)
            .ok_or_else(|| LedgerError::OperationNotFound(operation.clone()))?;

        let tx = match &op.state {
            OperationState::Rejected(reason) => {
                return Ok(SubmissionStatus::Rejected {
                    reason: reason.clone(),
                })
            }
            OperationState::Pending(tx) => *tx,
        };

        let receipt_of = |claims: &BTreeMap<u64, ClaimRecord>| {
            claims.get(&tx.seqno).and_then(|r| r.receipt.clone())
        };

        if let Some(receipt) = receipt_of(&state.claims) {
            return Ok(SubmissionStatus::Confirmed { tx, receipt });
        }
        if op.polls < self.config.commit_after_polls {
            op.polls += 1;
            return Ok(SubmissionStatus::Pending);
        }

        state.commit()?;
        let receipt = receipt_of(&state.claims)
            .ok_or_else(|| LedgerError::Internal(format!("no receipt after committing {}", tx)))?;
        Ok(SubmissionStatus::Confirmed { tx, receipt })
    }

    async fn network_status(&self) -> Result<NetworkStatus> {
        Ok(self.state.read().await.network_status())
    }

    async fn claim(&self, tx: TxId) -> Result<Vec<u8>> {
        let state = self.state.read().await;
        match state.claims.get(&tx.seqno) {
            Some(record) if record.tx == tx && record.receipt.is_some() => Ok(record.statement.clone()),
            Some(record) if record.tx == tx => Err(LedgerError::TxNotCommitted(tx)),
            _ => Err(LedgerError::TxNotFound(tx)),
        }
    }

    async fn receipt(&self, tx: TxId) -> Result<Vec<u8>> {
        let state = self.state.read().await;
        match state.claims.get(&tx.seqno) {
            Some(record) if record.tx == tx => record
                .receipt
                .clone()
                .ok_or(LedgerError::TxNotCommitted(tx)),
            _ => Err(LedgerError::TxNotFound(tx)),
        }
    }

    async fn enumerate(&self, start: u64, end: u64) -> Result<Page> {
        if start > end {
            return Err(LedgerError::InvalidInput(format!(
                "invalid range {}..={}",
                start, end
            )));
        }
        let state = self.state.read().await;
        if start < state.pruned_before {
            return Err(LedgerError::RangeUnavailable {
                start,
                end,
                available_from: state.pruned_before,
            });
        }

        let mut committed = state
            .claims
            .range(start..=end)
            .filter(|(_, record)| record.receipt.is_some())
            .map(|(_, record)| record.tx);
        let tx_ids: Vec<TxId> = committed.by_ref().take(self.config.page_size.max(1)).collect();
        let next = committed.next().map(|tx| tx.seqno);
        Ok(Page { tx_ids, next })
    }

    async fn service_parameters(&self) -> Result<ServiceParameters> {
        let state = self.state.read().await;
        Ok(ServiceParameters::from_certificate(
            state.service.certificate(),
            self.config.service_algorithm,
        ))
    }

    async fn historic_service_parameters(&self) -> Result<Vec<ServiceParameters>> {
        Ok(self.state.read().await.historic.clone())
    }
}
