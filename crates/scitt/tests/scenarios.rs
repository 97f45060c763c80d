//! End-to-end scenarios against the simulated ledger.

use scitt::core::{sign, Algorithm, Identity};
use scitt::ledger::{CancelToken, MemoryLedger, MemoryLedgerConfig};
use scitt::trust::VerifyError;
use scitt::{Client, ClientConfig, ClientError, RecoveryOutcome, TxId};
use scitt_testkit::fixtures::{claim_payload, signed_claims};
use scitt_testkit::{fast_ledger_config, fast_poll_config, TestCa};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn client(config: MemoryLedgerConfig) -> anyhow::Result<Client<MemoryLedger>> {
    let ledger = MemoryLedger::new(config)?;
    let config = ClientConfig::default().with_poll(fast_poll_config());
    Ok(Client::connect(ledger, config).await?)
}

#[tokio::test(start_paused = true)]
async fn test_sequential_claims_enumerate_and_verify() -> anyhow::Result<()> {
    init_tracing();
    let client = client(fast_ledger_config()).await?;
    let identity = Identity::generate(Algorithm::Es256, "issuer")?;
    let claims = signed_claims(&identity, 5)?;
    let cancel = CancelToken::new();

    let mut confirmed = Vec::new();
    for claim in &claims {
        let snapshot = client.trust_snapshot();
        let submission = client.submit_and_confirm(claim, &cancel).await?;
        confirmed.push((submission, snapshot));
    }

    let expected: Vec<TxId> = confirmed.iter().map(|(s, _)| s.tx).collect();
    let enumerated = client.enumerate_claims(0, u64::MAX)?.collect_all().await?;
    assert_eq!(enumerated, expected);
    assert!(enumerated.windows(2).all(|w| w[0].seqno < w[1].seqno));

    for ((submission, snapshot), claim) in confirmed.iter().zip(&claims) {
        assert_eq!(&client.get_claim(submission.tx).await?, claim);

        let rebuilt = client.get_transparent_statement(submission.tx).await?;
        let result = client.verify_with(&rebuilt.to_bytes()?, snapshot, claim)?;
        assert_eq!(result.tx, submission.tx);
        assert_eq!(result.trust_generation, snapshot.generation());
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_enumeration_subrange() -> anyhow::Result<()> {
    init_tracing();
    let client = client(fast_ledger_config().with_page_size(2)).await?;
    let identity = Identity::generate(Algorithm::Es256, "issuer")?;
    let cancel = CancelToken::new();

    let mut ids = Vec::new();
    for claim in signed_claims(&identity, 5)? {
        ids.push(client.submit_and_confirm(&claim, &cancel).await?.tx);
    }

    let middle = client
        .enumerate_claims(ids[1].seqno, ids[3].seqno)?
        .collect_all()
        .await?;
    assert_eq!(middle, ids[1..=3].to_vec());

    assert!(matches!(
        client.enumerate_claims(ids[3].seqno, ids[1].seqno),
        Err(ClientError::History(_))
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_recovery_between_submissions() -> anyhow::Result<()> {
    init_tracing();
    let client = client(fast_ledger_config()).await?;
    let signer = Identity::generate(Algorithm::Ps384, "issuer")?;
    let cancel = CancelToken::new();

    let before = client.network_status().await?;
    assert_eq!(before.recovery_count, 0);

    let first_store = client.trust_snapshot();
    let first = client
        .submit_and_confirm(&sign(&signer, &claim_payload(0))?, &cancel)
        .await?;
    let first_bytes = first.transparent_statement_bytes()?;
    client.verify_with(&first_bytes, &first_store, &first.statement)?;

    let after = client.ledger().restart().await?;
    assert_eq!(after.recovery_count, 1);
    assert_ne!(after.service_certificate, before.service_certificate);

    let outcome = client.refresh_trust().await?;
    assert!(matches!(outcome, RecoveryOutcome::Recovered { from: 0, to: 1, .. }));
    let second_store = client.trust_snapshot();
    assert!(second_store.generation() > first_store.generation());

    let second = client
        .submit_and_confirm(&sign(&signer, &claim_payload(1))?, &cancel)
        .await?;
    let second_bytes = second.transparent_statement_bytes()?;
    assert!(second.tx.seqno > first.tx.seqno);

    // Each statement verifies under the store in effect when it was confirmed.
    client.verify_with(&first_bytes, &first_store, &first.statement)?;
    client.verify_with(&second_bytes, &second_store, &second.statement)?;

    // The stores were replaced, not merged.
    assert!(matches!(
        client.verify_with(&second_bytes, &first_store, &second.statement),
        Err(ClientError::Verify(VerifyError::UntrustedAnchor { .. }))
    ));
    assert!(matches!(
        client.verify(&first_bytes, &first.statement),
        Err(ClientError::Verify(VerifyError::UntrustedAnchor { .. }))
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_every_algorithm_becomes_transparent() -> anyhow::Result<()> {
    init_tracing();
    let ca = TestCa::new(Algorithm::Es384)?;
    for service_algorithm in [Algorithm::Es256, Algorithm::Ps256] {
        let client = client(fast_ledger_config().with_service_algorithm(service_algorithm)).await?;
        let cancel = CancelToken::new();

        for (value, identity) in ca.issue_all()?.iter().enumerate() {
            let statement = sign(identity, &claim_payload(value as u64))?;
            let transparent = client.register_signed_statement(&statement, &cancel).await?;
            let result = client.verify(&transparent, &statement)?;
            assert_eq!(result.statement.algorithm(), identity.algorithm());
            assert_eq!(result.receipts[0].algorithm(), service_algorithm);
        }
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_verification_binds_to_original_statement() -> anyhow::Result<()> {
    init_tracing();
    let client = client(fast_ledger_config()).await?;
    let identity = Identity::generate(Algorithm::Es256, "issuer")?;
    let claims = signed_claims(&identity, 2)?;

    let transparent = client
        .register_signed_statement(&claims[0], &CancelToken::new())
        .await?;
    let err = client.verify(&transparent, &claims[1]).unwrap_err();
    assert!(matches!(
        err,
        ClientError::Verify(VerifyError::StatementMismatch(_))
    ));
    Ok(())
}
