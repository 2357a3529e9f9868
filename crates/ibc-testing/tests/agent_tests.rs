// Integration tests for agent synchronization, proof queries and configuration

mod common;

use std::time::Duration;

use common::{create_clients, fast_sync, setup_with};
use ibc_testing::{ChainError, HarnessConfig, HarnessError, SyncOptions};

#[tokio::test]
async fn test_query_proof_rejects_unprefixed_key_without_chain_access() {
    let mut chains = setup_with(fast_sync());
    let (_, client_b) = create_clients(&mut chains).await;

    // Both ledgers offline: only input validation can run
    chains.ledger_a.set_reachable(false);
    chains.ledger_b.set_reachable(false);

    let err = chains
        .a
        .query_proof(&chains.b, &client_b, &"ab".repeat(32))
        .await
        .unwrap_err();
    assert!(matches!(err, HarnessError::InvalidStorageKey { .. }), "{}", err);
}

#[tokio::test]
async fn test_query_proof_is_anchored_at_verifier_client_height() {
    let mut chains = setup_with(fast_sync());
    let (client_a, client_b) = create_clients(&mut chains).await;

    let key = chains.a.client_state_commitment_slot(&client_a).await.unwrap();
    assert!(key.starts_with("0x"));

    // B's client still trusts A's genesis, which predates client_a
    let err = chains.a.query_proof(&chains.b, &client_b, &key).await.unwrap_err();
    assert!(err.is_ordering_error());

    chains.a.update_header().await.unwrap();
    chains.b.update_besu_client(&chains.a, &client_b).await.unwrap();

    let proof = chains.a.query_proof(&chains.b, &client_b, &key).await.unwrap();
    let trusted = chains.b.get_client_state(&client_b).await.unwrap().latest_height;
    assert_eq!(proof.height, trusted);
}

#[tokio::test]
async fn test_update_header_reports_no_progress() {
    let mut chains = setup_with(SyncOptions {
        timeout: Duration::from_millis(100),
        ..fast_sync()
    });

    let first = chains.a.update_header().await.unwrap().height();
    let err = chains.a.update_header().await.unwrap_err();
    match err {
        HarnessError::NoProgress { chain_id, waited } => {
            assert_eq!(chain_id, common::CHAIN_A);
            assert_eq!(waited, Duration::from_millis(100));
        }
        other => panic!("expected NoProgress, got {}", other),
    }
    assert_eq!(chains.a.last_header().unwrap().number, first);

    chains.ledger_a.mine_block().await.unwrap();
    assert_eq!(chains.a.update_header().await.unwrap().height(), first + 1);
}

#[tokio::test]
async fn test_update_header_fails_fast_when_unreachable() {
    let mut chains = setup_with(fast_sync());
    chains.ledger_a.set_reachable(false);

    let started = std::time::Instant::now();
    let err = chains.a.update_header().await.unwrap_err();
    assert!(matches!(err, HarnessError::Chain(ChainError::Unreachable(id)) if id == common::CHAIN_A));
    assert!(err.is_liveness_error());
    assert!(started.elapsed() < fast_sync().timeout);
}

#[tokio::test]
async fn test_transactions_use_increasing_nonces() {
    let mut chains = setup_with(fast_sync());
    assert_eq!(chains.a.nonce(), 0);
    let (client_a, _) = create_clients(&mut chains).await;
    assert_eq!(chains.a.nonce(), 1);

    // Same header again reverts on chain but still consumes the nonce
    let err = chains.a.update_besu_client(&chains.b, &client_a).await.unwrap_err();
    assert!(matches!(err, HarnessError::TxFailed { .. }), "unexpected error: {}", err);
    assert_eq!(chains.a.nonce(), 2);

    let client = chains.a.create_besu_client(&chains.b).await.unwrap();
    assert_eq!(chains.a.nonce(), 3);
    assert_eq!(chains.a.client_ids().len(), 2);
    assert!(chains.a.get_client_state(&client).await.is_ok());
}

#[test]
fn test_config_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("harness.toml");

    let mut config = HarnessConfig::default();
    config.handshake.delay_period = 10;
    config.save(&path).unwrap();

    let loaded = HarnessConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_load_rejects_invalid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("harness.toml");

    let mut config = HarnessConfig::default();
    config.chains[0].mnemonic.clear();
    config.save(&path).unwrap();

    assert!(HarnessConfig::load(&path).is_err());
}
