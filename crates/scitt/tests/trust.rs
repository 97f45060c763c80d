//! Trust store behavior across service recoveries.

use scitt::core::{sign, Algorithm, Identity};
use scitt::ledger::{CancelToken, MemoryLedger};
use scitt::trust::VerifyError;
use scitt::{Client, ClientConfig, ClientError, Ledger, RecoveryOutcome};
use scitt_testkit::{claim_payload, fast_ledger_config, fast_poll_config};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[tokio::test(start_paused = true)]
async fn test_stale_store_rejects_new_receipts_until_refresh() -> anyhow::Result<()> {
    init_tracing();
    let ledger = MemoryLedger::new(fast_ledger_config())?;
    let client = Client::connect(ledger, ClientConfig::default().with_poll(fast_poll_config())).await?;
    let signer = Identity::generate(Algorithm::Es256, "issuer")?;
    let cancel = CancelToken::new();

    client.ledger().restart().await?;

    // The service keeps accepting submissions after recovery.
    let statement = sign(&signer, &claim_payload(0))?;
    let transparent = client.register_signed_statement(&statement, &cancel).await?;
    assert!(matches!(
        client.verify(&transparent, &statement),
        Err(ClientError::Verify(VerifyError::UntrustedAnchor { .. }))
    ));

    assert!(matches!(
        client.refresh_trust().await?,
        RecoveryOutcome::Recovered { .. }
    ));
    client.verify(&transparent, &statement)?;

    assert_eq!(client.refresh_trust().await?, RecoveryOutcome::Unchanged);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_historic_identities_readded_explicitly() -> anyhow::Result<()> {
    init_tracing();
    let ledger = MemoryLedger::new(fast_ledger_config())?;
    let client = Client::connect(ledger, ClientConfig::default().with_poll(fast_poll_config())).await?;
    let signer = Identity::generate(Algorithm::Es256, "issuer")?;
    let cancel = CancelToken::new();

    let old = sign(&signer, &claim_payload(0))?;
    let old_bytes = client.register_signed_statement(&old, &cancel).await?;

    client.ledger().restart().await?;
    client.refresh_trust().await?;
    assert!(client.verify(&old_bytes, &old).is_err());

    let snapshot = client.trust_historic_identities().await?;
    assert_eq!(snapshot.len(), 2);
    client.verify(&old_bytes, &old)?;

    let new = sign(&signer, &claim_payload(1))?;
    let new_bytes = client.register_signed_statement(&new, &cancel).await?;
    client.verify(&new_bytes, &new)?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_trust_dir_roots_survive_recovery() -> anyhow::Result<()> {
    init_tracing();
    let ledger = MemoryLedger::new(fast_ledger_config())?;
    let parameters = ledger.historic_service_parameters().await?;

    let dir = tempfile::tempdir()?;
    std::fs::write(
        dir.path().join("service.json"),
        serde_json::to_string_pretty(&parameters[0])?,
    )?;

    let config = ClientConfig::default()
        .with_poll(fast_poll_config())
        .with_trust_dir(dir.path());
    let client = Client::connect(ledger, config).await?;
    let signer = Identity::generate(Algorithm::Es256, "issuer")?;
    let cancel = CancelToken::new();

    let old = sign(&signer, &claim_payload(0))?;
    let old_bytes = client.register_signed_statement(&old, &cancel).await?;

    client.ledger().restart().await?;
    client.refresh_trust().await?;

    // The file-configured identity is an out-of-band root and stays trusted.
    client.verify(&old_bytes, &old)?;
    assert_eq!(client.trust_snapshot().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_bad_trust_dir_fails_connect() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("broken.json"), "{ not json")?;

    let ledger = MemoryLedger::new(fast_ledger_config())?;
    let result = Client::connect(ledger, ClientConfig::default().with_trust_dir(dir.path())).await;
    assert!(matches!(result, Err(ClientError::Trust(_))));
    Ok(())
}
