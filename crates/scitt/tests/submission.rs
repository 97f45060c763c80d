//! Submission failure paths through the client.

use std::time::Duration;

use scitt::core::{sign, sign_with, Algorithm, Identity, SignOptions};
use scitt::ledger::{CancelToken, MemoryLedger, MemoryLedgerConfig, SubmitError};
use scitt::{Client, ClientConfig, ClientError};
use scitt_testkit::{claim_payload, fast_ledger_config, fast_poll_config};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn stuck_client() -> anyhow::Result<Client<MemoryLedger>> {
    let ledger = MemoryLedger::new(MemoryLedgerConfig::default().with_commit_after_polls(u32::MAX))?;
    let poll = fast_poll_config().with_timeout(Duration::from_secs(1));
    Ok(Client::connect(ledger, ClientConfig::default().with_poll(poll)).await?)
}

#[tokio::test(start_paused = true)]
async fn test_timeout_then_resume_by_operation_id() -> anyhow::Result<()> {
    init_tracing();
    let client = stuck_client().await?;
    let statement = sign(&Identity::generate(Algorithm::Es256, "issuer")?, &claim_payload(0))?;

    let err = client
        .submit_and_confirm(&statement, &CancelToken::new())
        .await
        .unwrap_err();
    assert!(err.is_transient());
    let operation = match err {
        ClientError::Submit(SubmitError::ConfirmationTimeout { operation, .. }) => operation,
        other => panic!("expected timeout, got {:?}", other),
    };

    client.ledger().commit().await?;
    let confirmation = client.confirm(&operation, &CancelToken::new()).await?;
    assert_eq!(confirmation.receipt.tx(), confirmation.tx);

    // The timed-out statement was recorded exactly once.
    let ids = client.enumerate_claims(0, u64::MAX)?.collect_all().await?;
    assert_eq!(ids, vec![confirmation.tx]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_polling() -> anyhow::Result<()> {
    init_tracing();
    let client = stuck_client().await?;
    let statement = sign(&Identity::generate(Algorithm::Es256, "issuer")?, &claim_payload(0))?;
    let cancel = CancelToken::new();

    let canceller = {
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        }
    };
    let (result, ()) = tokio::join!(client.submit_and_confirm(&statement, &cancel), canceller);
    assert!(matches!(
        result,
        Err(ClientError::Submit(SubmitError::Cancelled(_)))
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_policy_rejection() -> anyhow::Result<()> {
    init_tracing();
    let ledger = MemoryLedger::new(
        MemoryLedgerConfig::default().with_accepted_algorithms(vec![Algorithm::Es256]),
    )?;
    let client = Client::connect(ledger, ClientConfig::default().with_poll(fast_poll_config())).await?;
    let statement = sign(&Identity::generate(Algorithm::Es512, "issuer")?, &claim_payload(0))?;

    let err = client
        .submit_and_confirm(&statement, &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Submit(SubmitError::Rejected { .. })
    ));
    assert!(!err.is_transient());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_skip_confirmation_submit() -> anyhow::Result<()> {
    init_tracing();
    let ledger = MemoryLedger::new(MemoryLedgerConfig::default())?;
    let client = Client::connect(ledger, ClientConfig::default().with_poll(fast_poll_config())).await?;
    let statement = sign(&Identity::generate(Algorithm::Es256, "issuer")?, &claim_payload(0))?;

    let operation = client.submit(&statement).await?;
    assert_eq!(client.ledger().pending_count().await, 1);

    let confirmation = client.confirm(&operation, &CancelToken::new()).await?;
    let submission = confirmation.into_submission(statement.clone());
    client.verify(&submission.transparent_statement_bytes()?, &statement)?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_accepted_issuers() -> anyhow::Result<()> {
    init_tracing();
    let ledger = MemoryLedger::new(
        fast_ledger_config().with_accepted_issuers(["did:web:trusted.example"]),
    )?;
    let client = Client::connect(ledger, ClientConfig::default().with_poll(fast_poll_config())).await?;
    let signer = Identity::generate(Algorithm::Es256, "issuer")?;
    let cancel = CancelToken::new();

    let accepted = sign_with(
        &signer,
        &claim_payload(0),
        &SignOptions::default().with_issuer("did:web:trusted.example"),
    )?;
    let submission = client.submit_and_confirm(&accepted, &cancel).await?;
    client.verify(&submission.transparent_statement_bytes()?, &accepted)?;

    let unknown = sign_with(
        &signer,
        &claim_payload(1),
        &SignOptions::default().with_issuer("did:web:other.example"),
    )?;
    let err = client.submit_and_confirm(&unknown, &cancel).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Submit(SubmitError::Rejected { ref reason, .. }) if reason.contains("did:web:other.example")
    ));

    let anonymous = sign(&signer, &claim_payload(2))?;
    let err = client.submit_and_confirm(&anonymous, &cancel).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Submit(SubmitError::Rejected { .. })
    ));

    let ids = client.enumerate_claims(0, u64::MAX)?.collect_all().await?;
    assert_eq!(ids, vec![submission.tx]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_submissions() -> anyhow::Result<()> {
    init_tracing();
    let ledger = MemoryLedger::new(MemoryLedgerConfig::default().with_commit_after_polls(3))?;
    let client = Client::connect(ledger, ClientConfig::default().with_poll(fast_poll_config())).await?;
    let signer = Identity::generate(Algorithm::Es256, "issuer")?;
    let statements = (0..5)
        .map(|i| sign(&signer, &claim_payload(i)))
        .collect::<Result<Vec<_>, _>>()?;

    let cancel = CancelToken::new();
    let stopped = CancelToken::new();
    let canceller = {
        let stopped = stopped.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            stopped.cancel();
        }
    };
    let (a, b, c, d, e, ()) = tokio::join!(
        client.submit_and_confirm(&statements[0], &cancel),
        client.submit_and_confirm(&statements[1], &cancel),
        client.submit_and_confirm(&statements[2], &cancel),
        client.submit_and_confirm(&statements[3], &cancel),
        client.submit_and_confirm(&statements[4], &stopped),
        canceller,
    );
    assert!(matches!(
        e,
        Err(ClientError::Submit(SubmitError::Cancelled(_)))
    ));

    let trust = client.trust_snapshot();
    let confirmed = [a?, b?, c?, d?];
    for (submission, statement) in confirmed.iter().zip(&statements) {
        let bytes = submission.transparent_statement_bytes()?;
        let result = client.verify_with(&bytes, &trust, statement)?;
        assert_eq!(result.tx, submission.tx);
        assert_eq!(result.trust_generation, trust.generation());
    }

    let mut txs: Vec<_> = confirmed.iter().map(|s| s.tx).collect();
    txs.sort();
    txs.dedup();
    assert_eq!(txs.len(), 4);
    Ok(())
}
