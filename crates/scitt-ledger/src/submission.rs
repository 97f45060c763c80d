//! Submission coordinator.
//!
//! A submission is sent exactly once and then polled until the ledger
//! reports it durable, rejects it, or the deadline passes. Only status
//! polls are retried. Each poll loop is bounded by a deadline and an
//! explicit [`CancelToken`]; cancelling stops the local loop and leaves the
//! ledger-side operation alone.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use scitt_core::{Receipt, SignedStatement, TransparentStatement, TxId};

use crate::error::SubmitError;
use crate::traits::{Ledger, OperationId, SubmissionStatus};

/// Result type for submissions.
pub type Result<T> = std::result::Result<T, SubmitError>;

/// Shortest wait between two status polls.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Stand-in deadline for timeouts too large to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Status polling schedule.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Wait before the second poll.
    pub initial_interval: Duration,
    /// Multiplier applied to the interval after each poll.
    pub backoff_factor: u32,
    /// Upper bound on the interval.
    pub max_interval: Duration,
    /// How long to poll before giving up.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(50),
            backoff_factor: 2,
            max_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

impl PollConfig {
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    pub fn with_backoff_factor(mut self, factor: u32) -> Self {
        self.backoff_factor = factor.max(1);
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn next_interval(&self, current: Duration) -> Duration {
        current
            .saturating_mul(self.backoff_factor.max(1))
            .min(self.max_interval)
            .max(MIN_POLL_INTERVAL)
    }

    /// Deadline `timeout` from `now`, saturating far in the future.
    fn deadline_from(&self, now: Instant) -> Instant {
        now.checked_add(self.timeout)
            .unwrap_or_else(|| now + FAR_FUTURE)
    }
}

/// Cooperative cancellation for poll loops.
///
/// Clones share state: cancelling one cancels all.
#[derive(Clone, Debug)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        match receiver.wait_for(|cancelled| *cancelled).await {
            Ok(_) => {}
            Err(_) => std::future::pending().await,
        };
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// A durable operation, as reported by the ledger.
#[derive(Clone, Debug)]
pub struct Confirmation {
    pub operation: OperationId,
    pub tx: TxId,
    pub receipt: Receipt,
}

impl Confirmation {
    pub fn seqno(&self) -> u64 {
        self.tx.seqno
    }

    /// Attach the statement the operation was created for.
    pub fn into_submission(self, statement: SignedStatement) -> Submission {
        Submission {
            operation: self.operation,
            tx: self.tx,
            receipt: self.receipt,
            statement,
        }
    }
}

/// A confirmed submission.
#[derive(Clone, Debug)]
pub struct Submission {
    pub operation: OperationId,
    pub tx: TxId,
    pub receipt: Receipt,
    pub statement: SignedStatement,
}

impl Submission {
    pub fn seqno(&self) -> u64 {
        self.tx.seqno
    }

    /// The statement with its receipt embedded.
    pub fn transparent_statement(&self) -> scitt_core::Result<TransparentStatement> {
        TransparentStatement::new(self.statement.clone(), vec![self.receipt.clone()])
    }

    pub fn transparent_statement_bytes(&self) -> scitt_core::Result<Vec<u8>> {
        self.transparent_statement()?.to_bytes()
    }
}

/// Drives statements from submission to confirmation against one ledger.
pub struct Submitter<L: Ledger> {
    ledger: L,
    config: PollConfig,
    /// Highest transaction confirmed through `submit_and_confirm`.
    last_confirmed: Mutex<Option<TxId>>,
}

impl<L: Ledger> Submitter<L> {
    pub fn new(ledger: L, config: PollConfig) -> Self {
        Self {
            ledger,
            config,
            last_confirmed: Mutex::new(None),
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn last_confirmed(&self) -> Option<TxId> {
        *self
            .last_confirmed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Send the statement once and return without waiting for durability.
    pub async fn submit(&self, statement: &SignedStatement) -> Result<OperationId> {
        let operation = self.ledger.submit(statement.as_bytes()).await?;
        tracing::debug!("Submitted statement as operation {}", operation);
        Ok(operation)
    }

    /// Poll a known operation until it is durable, using the configured timeout.
    pub async fn confirm(&self, operation: &OperationId, cancel: &CancelToken) -> Result<Confirmation> {
        self.confirm_until(operation, self.config.deadline_from(Instant::now()), cancel)
            .await
    }

    /// Poll a known operation until it is durable or `deadline` passes.
    pub async fn confirm_until(
        &self,
        operation: &OperationId,
        deadline: Instant,
        cancel: &CancelToken,
    ) -> Result<Confirmation> {
        self.poll(operation, deadline, cancel, None).await
    }

    /// Submit once, then poll until confirmed.
    ///
    /// The confirmed seqno must exceed every seqno previously confirmed
    /// through this method; a regression is returned as
    /// [`SubmitError::SequenceRegression`].
    pub async fn submit_and_confirm(
        &self,
        statement: &SignedStatement,
        cancel: &CancelToken,
    ) -> Result<Submission> {
        let deadline = self.config.deadline_from(Instant::now());
        let floor = self.last_confirmed();
        let operation = self.submit(statement).await?;
        let confirmation = self.poll(&operation, deadline, cancel, floor).await?;

        {
            let mut last = self
                .last_confirmed
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if last.map_or(true, |previous| previous.seqno < confirmation.tx.seqno) {
                *last = Some(confirmation.tx);
            }
        }

        Ok(confirmation.into_submission(statement.clone()))
    }

    /// Submit, confirm, and return the encoded transparent statement.
    pub async fn register_signed_statement(
        &self,
        statement: &SignedStatement,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>> {
        let submission = self.submit_and_confirm(statement, cancel).await?;
        Ok(submission.transparent_statement_bytes()?)
    }

    async fn poll(
        &self,
        operation: &OperationId,
        deadline: Instant,
        cancel: &CancelToken,
        floor: Option<TxId>,
    ) -> Result<Confirmation> {
        let started = Instant::now();
        let mut interval = self.config.initial_interval.max(MIN_POLL_INTERVAL);
        let mut last_error = None;
        let mut polls = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(SubmitError::Cancelled(operation.clone()));
            }

            polls += 1;
            match self.ledger.submission_status(operation).await {
                Ok(SubmissionStatus::Confirmed { tx, receipt }) => {
                    let confirmation = accept(operation, tx, &receipt, floor)?;
                    tracing::info!(
                        "Operation {} confirmed at {} after {} polls",
                        operation,
                        tx,
                        polls
                    );
                    return Ok(confirmation);
                }
                Ok(SubmissionStatus::Rejected { reason }) => {
                    tracing::warn!("Operation {} rejected: {}", operation, reason);
                    return Err(SubmitError::Rejected {
                        operation: operation.clone(),
                        reason,
                    });
                }
                Ok(SubmissionStatus::Pending) => {
                    tracing::debug!("Operation {} pending (poll {})", operation, polls);
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!("Polling operation {} failed, will retry: {}", operation, e);
                    last_error = Some(e.to_string());
                }
                Err(e) => return Err(e.into()),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(SubmitError::ConfirmationTimeout {
                    operation: operation.clone(),
                    waited: now - started,
                    last_error,
                });
            }

            let wake = now.checked_add(interval).map_or(deadline, |at| at.min(deadline));
            tokio::select! {
                _ = tokio::time::sleep_until(wake) => {}
                _ = cancel.cancelled() => {
                    return Err(SubmitError::Cancelled(operation.clone()));
                }
            }
            interval = self.config.next_interval(interval);
        }
    }
}

fn accept(
    operation: &OperationId,
    tx: TxId,
    receipt: &[u8],
    floor: Option<TxId>,
) -> Result<Confirmation> {
    let receipt = Receipt::from_bytes(receipt).map_err(|e| SubmitError::InvalidReceipt {
        operation: operation.clone(),
        reason: e.to_string(),
    })?;
    if receipt.tx() != tx {
        return Err(SubmitError::ReceiptMismatch {
            operation: operation.clone(),
            status_tx: tx,
            receipt_tx: receipt.tx(),
        });
    }
    if let Some(previous) = floor {
        if tx.seqno <= previous.seqno {
            return Err(SubmitError::SequenceRegression {
                operation: operation.clone(),
                previous,
                confirmed: tx,
            });
        }
    }
    Ok(Confirmation {
        operation: operation.clone(),
        tx,
        receipt,
    })
}
