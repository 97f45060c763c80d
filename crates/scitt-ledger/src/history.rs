//! History enumeration and point lookups.
//!
//! [`ClaimCursor`] walks the confirmed claims in a seqno range one ledger
//! page at a time. Each page is checked against what was asked for: ids
//! must be strictly ascending across pages, inside the range, and the
//! continuation must move forward. A ledger that breaks any of these is
//! reported, not papered over.

use std::collections::VecDeque;

use scitt_core::{Receipt, SignedStatement, TransparentStatement, TxId};

use crate::error::HistoryError;
use crate::traits::{Ledger, Page};

/// Result type for history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Read-only access to ledger history.
pub struct History<L: Ledger> {
    ledger: L,
}

impl<L: Ledger> History<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Lazily enumerate confirmed claims with seqno in `[start, end]`.
    pub fn enumerate_claims(&self, start: u64, end: u64) -> Result<ClaimCursor<'_, L>> {
        ClaimCursor::new(&self.ledger, start, end)
    }

    /// The signed statement recorded at `tx`.
    pub async fn get_claim(&self, tx: TxId) -> Result<SignedStatement> {
        let bytes = self.ledger.claim(tx).await?;
        SignedStatement::from_bytes(&bytes).map_err(|e| HistoryError::InvalidRecord {
            tx,
            reason: e.to_string(),
        })
    }

    /// The receipt for the claim at `tx`.
    pub async fn get_receipt(&self, tx: TxId) -> Result<Receipt> {
        let bytes = self.ledger.receipt(tx).await?;
        let receipt = Receipt::from_bytes(&bytes).map_err(|e| HistoryError::InvalidRecord {
            tx,
            reason: e.to_string(),
        })?;
        if receipt.tx() != tx {
            return Err(HistoryError::InvalidRecord {
                tx,
                reason: format!("receipt is for {}", receipt.tx()),
            });
        }
        Ok(receipt)
    }

    /// Rebuild the transparent statement for `tx` from its claim and receipt.
    pub async fn get_transparent_statement(&self, tx: TxId) -> Result<TransparentStatement> {
        let statement = self.get_claim(tx).await?;
        let receipt = self.get_receipt(tx).await?;
        TransparentStatement::new(statement, vec![receipt]).map_err(|e| {
            HistoryError::InvalidRecord {
                tx,
                reason: e.to_string(),
            }
        })
    }
}

/// Paged, restartable cursor over confirmed claim ids.
pub struct ClaimCursor<'a, L: Ledger> {
    ledger: &'a L,
    start: u64,
    end: u64,
    /// Seqno of the next page request; `None` once exhausted.
    next_seqno: Option<u64>,
    buffer: VecDeque<TxId>,
    last: Option<TxId>,
}

impl<'a, L: Ledger> ClaimCursor<'a, L> {
    fn new(ledger: &'a L, start: u64, end: u64) -> Result<Self> {
        if start > end {
            return Err(HistoryError::InvalidRange { start, end });
        }
        Ok(Self {
            ledger,
            start,
            end,
            next_seqno: Some(start),
            buffer: VecDeque::new(),
            last: None,
        })
    }

    pub fn range(&self) -> (u64, u64) {
        (self.start, self.end)
    }

    /// The next claim id, or `None` when the range is exhausted.
    pub async fn next(&mut self) -> Result<Option<TxId>> {
        loop {
            if let Some(tx) = self.buffer.pop_front() {
                self.last = Some(tx);
                return Ok(Some(tx));
            }
            let Some(from) = self.next_seqno else {
                return Ok(None);
            };
            let page = self.ledger.enumerate(from, self.end).await?;
            self.accept_page(from, page)?;
        }
    }

    /// Drain the cursor.
    pub async fn collect_all(mut self) -> Result<Vec<TxId>> {
        let mut ids = Vec::new();
        while let Some(tx) = self.next().await? {
            ids.push(tx);
        }
        Ok(ids)
    }

    /// Start again from the beginning of the range.
    pub fn restart(&mut self) {
        self.next_seqno = Some(self.start);
        self.buffer.clear();
        self.last = None;
    }

    fn accept_page(&mut self, from: u64, page: Page) -> Result<()> {
        let mut previous = self.last;
        for &tx in &page.tx_ids {
            if tx.seqno < from || tx.seqno > self.end {
                return Err(HistoryError::OutOfRange {
                    tx,
                    start: self.start,
                    end: self.end,
                });
            }
            if let Some(prev) = previous {
                if tx.seqno <= prev.seqno {
                    return Err(HistoryError::OutOfOrder { previous: prev, next: tx });
                }
            }
            previous = Some(tx);
        }

        self.next_seqno = match page.next {
            Some(next) if next <= from => return Err(HistoryError::StalledCursor(from)),
            Some(next) if next > self.end => None,
            other => other,
        };
        tracing::debug!(
            "Enumerated {} claims from seqno {}, next {:?}",
            page.tx_ids.len(),
            from,
            self.next_seqno
        );
        self.buffer.extend(page.tx_ids);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::memory::{MemoryLedger, MemoryLedgerConfig};
    use crate::traits::{OperationId, SubmissionStatus};
    use async_trait::async_trait;
    use scitt_core::{sign, Algorithm, Identity, NetworkStatus};
    use scitt_trust::{verify_transparent_statement, ServiceParameters, TrustSnapshot};
    use std::sync::Mutex;

    async fn ledger_with_claims(count: u32, page_size: usize) -> (MemoryLedger, Vec<TxId>, Vec<SignedStatement>) {
        let ledger = MemoryLedger::new(
            MemoryLedgerConfig::default()
                .with_page_size(page_size)
                .with_commit_after_polls(0),
        )
        .unwrap();
        let signer = Identity::generate(Algorithm::Es256, "signer").unwrap();
        let mut ids = Vec::new();
        let mut statements = Vec::new();
        for value in 0..count {
            let stmt = sign(&signer, format!(r#"{{"value":{}}}"#, value).as_bytes()).unwrap();
            let op = ledger.submit(stmt.as_bytes()).await.unwrap();
            match ledger.submission_status(&op).await.unwrap() {
                SubmissionStatus::Confirmed { tx, .. } => ids.push(tx),
                other => panic!("expected confirmation, got {:?}", other),
            }
            statements.push(stmt);
        }
        (ledger, ids, statements)
    }

    #[tokio::test]
    async fn test_enumerates_all_confirmed_in_order() {
        let (ledger, ids, _) = ledger_with_claims(5, 2).await;
        let history = History::new(ledger);
        let all = history
            .enumerate_claims(0, u64::MAX)
            .unwrap()
            .collect_all()
            .await
            .unwrap();
        assert_eq!(all, ids);
    }

    #[tokio::test]
    async fn test_enumerates_subrange() {
        let (ledger, ids, _) = ledger_with_claims(5, 2).await;
        let history = History::new(ledger);
        let middle = history
            .enumerate_claims(ids[1].seqno, ids[3].seqno)
            .unwrap()
            .collect_all()
            .await
            .unwrap();
        assert_eq!(middle, ids[1..=3].to_vec());
    }

    #[tokio::test]
    async fn test_cursor_restarts() {
        let (ledger, ids, _) = ledger_with_claims(3, 1).await;
        let history = History::new(ledger);
        let mut cursor = history.enumerate_claims(0, 100).unwrap();
        assert_eq!(cursor.next().await.unwrap(), Some(ids[0]));
        assert_eq!(cursor.next().await.unwrap(), Some(ids[1]));
        cursor.restart();
        assert_eq!(cursor.collect_all().await.unwrap(), ids);
    }

    #[tokio::test]
    async fn test_invalid_range() {
        let (ledger, _, _) = ledger_with_claims(0, 2).await;
        let history = History::new(ledger);
        assert!(matches!(
            history.enumerate_claims(5, 4),
            Err(HistoryError::InvalidRange { start: 5, end: 4 })
        ));
        assert!(history
            .enumerate_claims(4, 4)
            .unwrap()
            .collect_all()
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_pruned_range_unavailable() {
        let (ledger, ids, _) = ledger_with_claims(3, 2).await;
        ledger.prune(ids[1].seqno).await;
        let history = History::new(ledger);
        let err = history
            .enumerate_claims(0, 100)
            .unwrap()
            .collect_all()
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::RangeUnavailable { .. }));
        assert!(err.is_consistency_error());
    }

    #[tokio::test]
    async fn test_point_lookups() {
        let (ledger, ids, statements) = ledger_with_claims(2, 2).await;
        let status = ledger.network_status().await.unwrap();
        let history = History::new(ledger);

        assert_eq!(history.get_claim(ids[1]).await.unwrap(), statements[1]);
        assert_eq!(history.get_receipt(ids[0]).await.unwrap().tx(), ids[0]);

        let transparent = history.get_transparent_statement(ids[0]).await.unwrap();
        let trust = TrustSnapshot::new(1, [status.service_certificate]);
        let result = verify_transparent_statement(
            &transparent.to_bytes().unwrap(),
            &trust,
            &statements[0],
        )
        .unwrap();
        assert_eq!(result.tx, ids[0]);

        let unknown = TxId::new(ids[0].view, 1000);
        assert!(matches!(
            history.get_claim(unknown).await,
            Err(HistoryError::NotFound(tx)) if tx == unknown
        ));
    }

    #[tokio::test]
    async fn test_lookup_before_confirmation() {
        let ledger = MemoryLedger::new(MemoryLedgerConfig::default().with_commit_after_polls(5)).unwrap();
        let signer = Identity::generate(Algorithm::Es256, "signer").unwrap();
        let stmt = sign(&signer, b"{}").unwrap();
        ledger.submit(stmt.as_bytes()).await.unwrap();
        let history = History::new(ledger);

        let tx = TxId::new(2, 1);
        assert!(matches!(
            history.get_receipt(tx).await,
            Err(HistoryError::NotYetConfirmed(_))
        ));
        assert!(history
            .enumerate_claims(0, 10)
            .unwrap()
            .collect_all()
            .await
            .unwrap()
            .is_empty());
    }

    /// Serves enumeration pages from a fixed script.
    struct PagedLedger {
        pages: Mutex<VecDeque<Page>>,
    }

    impl PagedLedger {
        fn new(pages: Vec<Page>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
            }
        }
    }

    fn unsupported<T>() -> crate::error::Result<T> {
        Err(LedgerError::Internal("unsupported".into()))
    }

    #[async_trait]
    impl Ledger for PagedLedger {
        async fn submit(&self, _: &[u8]) -> crate::error::Result<OperationId> {
            unsupported()
        }

        async fn submission_status(&self, _: &OperationId) -> crate::error::Result<SubmissionStatus> {
            unsupported()
        }

        async fn network_status(&self) -> crate::error::Result<NetworkStatus> {
            unsupported()
        }

        async fn claim(&self, _: TxId) -> crate::error::Result<Vec<u8>> {
            unsupported()
        }

        async fn receipt(&self, _: TxId) -> crate::error::Result<Vec<u8>> {
            unsupported()
        }

        async fn enumerate(&self, _: u64, _: u64) -> crate::error::Result<Page> {
            Ok(self.pages.lock().unwrap().pop_front().unwrap_or_default())
        }

        async fn service_parameters(&self) -> crate::error::Result<ServiceParameters> {
            unsupported()
        }

        async fn historic_service_parameters(&self) -> crate::error::Result<Vec<ServiceParameters>> {
            unsupported()
        }
    }

    fn page(seqnos: &[u64], next: Option<u64>) -> Page {
        Page {
            tx_ids: seqnos.iter().map(|&s| TxId::new(2, s)).collect(),
            next,
        }
    }

    async fn enumerate_scripted(pages: Vec<Page>, start: u64, end: u64) -> Result<Vec<TxId>> {
        let history = History::new(PagedLedger::new(pages));
        let result = history.enumerate_claims(start, end)?.collect_all().await;
        result
    }

    #[tokio::test]
    async fn test_out_of_order_across_pages() {
        let err = enumerate_scripted(vec![page(&[1, 5], Some(6)), page(&[4], None)], 0, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::OutOfOrder { .. }));
    }

    #[tokio::test]
    async fn test_out_of_order_within_page() {
        let err = enumerate_scripted(vec![page(&[3, 3], None)], 0, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::OutOfOrder { .. }));
    }

    #[tokio::test]
    async fn test_out_of_range() {
        let err = enumerate_scripted(vec![page(&[2, 11], None)], 0, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::OutOfRange { .. }));
    }

    #[tokio::test]
    async fn test_stalled_continuation() {
        let err = enumerate_scripted(vec![page(&[2], Some(3)), page(&[], Some(3))], 0, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::StalledCursor(3)));
    }

    #[tokio::test]
    async fn test_continuation_past_end_finishes() {
        let ids = enumerate_scripted(vec![page(&[2, 4], Some(12))], 0, 10)
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
    }
}
