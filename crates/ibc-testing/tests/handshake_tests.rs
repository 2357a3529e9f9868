// Integration tests for the connection handshake between two in-memory ledgers

mod common;

use std::time::Duration;

use common::{create_clients, setup_producing, setup_producing_with};
use ibc_testing::commitment::StorageProof;
use ibc_testing::types::version::ORDER_ORDERED;
use ibc_testing::types::{
    Counterparty, IbcMsg, MsgConnectionOpenAck, MsgConnectionOpenTry, State, Version,
};
use ibc_testing::{
    ChainAgent, ChainError, ConnectionHandshake, HandshakeConfig, HandshakeState, HarnessError,
    TestConnection,
};

/// Corrupt the committed value carried by an encoded storage proof
fn tamper(data: &[u8]) -> Vec<u8> {
    let mut proof = StorageProof::decode(data).unwrap();
    if let Some(value) = proof.value.as_mut() {
        value[0] ^= 0xff;
    }
    proof.encode().unwrap()
}

/// Try message for `connection` on `b`, proving `a`'s INIT at the trusted height
async fn try_msg(
    a: &ChainAgent,
    b: &ChainAgent,
    conn_a: &TestConnection,
    conn_b: &TestConnection,
) -> MsgConnectionOpenTry {
    let key = b.connection_state_commitment_slot(&conn_a.id).await.unwrap();
    let proof = a.query_proof(b, &conn_b.client_id, &key).await.unwrap();
    MsgConnectionOpenTry {
        connection_id: conn_b.id.clone(),
        counterparty: Counterparty::new(
            conn_a.client_id.clone(),
            Some(conn_a.id.clone()),
            a.commitment_prefix(),
        ),
        delay_period: b.handshake_config().delay_period,
        client_id: conn_b.client_id.clone(),
        counterparty_versions: a.supported_versions().to_vec(),
        proof_height: proof.height,
        proof_init: proof.data,
    }
}

fn failure_reason(err: HarnessError) -> String {
    match err {
        HarnessError::TxFailed { reason, .. } => reason,
        other => panic!("expected TxFailed, got {}", other),
    }
}

#[tokio::test]
async fn test_connection_handshake_end_to_end() {
    let mut chains = setup_producing(Duration::from_millis(10));
    let (client_a, client_b) = create_clients(&mut chains).await;
    let (a, b) = (&mut chains.a, &mut chains.b);

    let conn_a = a.add_test_connection(&client_a, &client_b);
    let conn_b = b.add_test_connection(&client_b, &client_a);

    a.connection_open_init(b, &conn_a, &conn_b).await.unwrap();

    a.update_header().await.unwrap();
    b.update_besu_client(a, &client_b).await.unwrap();
    b.connection_open_try(a, &conn_b, &conn_a).await.unwrap();

    b.update_header().await.unwrap();
    a.update_besu_client(b, &client_a).await.unwrap();
    a.connection_open_ack(b, &conn_a, &conn_b).await.unwrap();

    a.update_header().await.unwrap();
    b.update_besu_client(a, &client_b).await.unwrap();
    b.connection_open_confirm(a, &conn_b, &conn_a).await.unwrap();

    let end_a = a.backend().query_connection(&conn_a.id).await.unwrap().unwrap();
    let end_b = b.backend().query_connection(&conn_b.id).await.unwrap().unwrap();
    assert_eq!(end_a.state, State::Open);
    assert_eq!(end_b.state, State::Open);
    assert_eq!(end_a.counterparty_connection_id(), Some(conn_b.id.as_str()));
    assert_eq!(end_b.counterparty_connection_id(), Some(conn_a.id.as_str()));
    assert_eq!(end_a.versions, end_b.versions);

    assert!(a.verify_client_state(&client_a, b, &client_b).await.unwrap());
    assert!(b.verify_client_state(&client_b, a, &client_a).await.unwrap());
}

#[tokio::test]
async fn test_try_before_init_fails_with_proof_not_found() {
    let mut chains = setup_producing(Duration::from_millis(10));
    let (client_a, client_b) = create_clients(&mut chains).await;
    let (a, b) = (&mut chains.a, &mut chains.b);

    let conn_a = a.add_test_connection(&client_a, &client_b);
    let conn_b = b.add_test_connection(&client_b, &client_a);

    let err = b.connection_open_try(a, &conn_b, &conn_a).await.unwrap_err();
    assert!(err.is_ordering_error(), "unexpected error: {}", err);
    assert!(b.backend().query_connection(&conn_b.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_ack_before_try_fails_with_proof_not_found() {
    let mut chains = setup_producing(Duration::from_millis(10));
    let (client_a, client_b) = create_clients(&mut chains).await;
    let (a, b) = (&mut chains.a, &mut chains.b);

    let conn_a = a.add_test_connection(&client_a, &client_b);
    let conn_b = b.add_test_connection(&client_b, &client_a);
    a.connection_open_init(b, &conn_a, &conn_b).await.unwrap();

    b.update_header().await.unwrap();
    a.update_besu_client(b, &client_a).await.unwrap();
    let err = a.connection_open_ack(b, &conn_a, &conn_b).await.unwrap_err();
    match err {
        HarnessError::ProofNotFound { chain_id, .. } => assert_eq!(chain_id, b.chain_id()),
        other => panic!("expected ProofNotFound, got {}", other),
    }

    let end_a = a.backend().query_connection(&conn_a.id).await.unwrap().unwrap();
    assert_eq!(end_a.state, State::Init);
}

#[tokio::test]
async fn test_confirm_on_init_end_is_rejected_on_chain() {
    let mut chains = setup_producing(Duration::from_millis(10));
    let (client_a, client_b) = create_clients(&mut chains).await;
    let (a, b) = (&mut chains.a, &mut chains.b);

    let conn_a = a.add_test_connection(&client_a, &client_b);
    let conn_b = b.add_test_connection(&client_b, &client_a);
    a.connection_open_init(b, &conn_a, &conn_b).await.unwrap();
    b.connection_open_init(a, &conn_b, &conn_a).await.unwrap();

    // Both ends are INIT, so the proof exists but the host refuses the step
    b.update_header().await.unwrap();
    a.update_besu_client(b, &client_a).await.unwrap();
    let err = a.connection_open_confirm(b, &conn_a, &conn_b).await.unwrap_err();
    assert!(matches!(err, HarnessError::TxFailed { .. }), "unexpected error: {}", err);
}

#[tokio::test]
async fn test_handshake_driver_opens_connection() {
    let mut chains = setup_producing(Duration::from_millis(10));
    let (client_a, client_b) = create_clients(&mut chains).await;
    let (a, b) = (&mut chains.a, &mut chains.b);

    let conn_a = a.add_test_connection(&client_a, &client_b);
    let conn_b = b.add_test_connection(&client_b, &client_a);

    let mut handshake = ConnectionHandshake::new(conn_a.clone(), conn_b.clone());
    assert_eq!(handshake.state(), HandshakeState::NotStarted);
    handshake.complete_handshake(a, b).await.unwrap();
    assert_eq!(handshake.state(), HandshakeState::Open);

    for (agent, connection) in [(&*a, &conn_a), (&*b, &conn_b)] {
        let end = agent.backend().query_connection(&connection.id).await.unwrap().unwrap();
        assert!(end.is_open());
    }
}

#[tokio::test]
async fn test_handshake_driver_resumes_after_outage() {
    let mut chains = setup_producing(Duration::from_millis(10));
    let (client_a, client_b) = create_clients(&mut chains).await;
    let conn_a = chains.a.add_test_connection(&client_a, &client_b);
    let conn_b = chains.b.add_test_connection(&client_b, &client_a);
    let mut handshake = ConnectionHandshake::new(conn_a, conn_b.clone());

    chains.ledger_b.set_reachable(false);
    let err = handshake
        .complete_handshake(&mut chains.a, &mut chains.b)
        .await
        .unwrap_err();
    assert!(matches!(err, HarnessError::Chain(ChainError::Unreachable(_))));
    assert!(err.is_liveness_error());
    assert_eq!(handshake.state(), HandshakeState::Init);

    chains.ledger_b.set_reachable(true);
    handshake
        .complete_handshake(&mut chains.a, &mut chains.b)
        .await
        .unwrap();
    assert_eq!(handshake.state(), HandshakeState::Open);

    let end_b = chains.b.backend().query_connection(&conn_b.id).await.unwrap().unwrap();
    assert_eq!(end_b.state, State::Open);
}

#[tokio::test]
async fn test_handshake_with_ordered_only_versions() {
    let ordered_only = Version::new("1".to_string(), vec![ORDER_ORDERED.to_string()]);
    let handshake_config = HandshakeConfig {
        versions: vec![ordered_only.clone()],
        ..HandshakeConfig::default()
    };
    let mut chains = setup_producing_with(Duration::from_millis(10), handshake_config);
    let (client_a, client_b) = create_clients(&mut chains).await;
    let (a, b) = (&mut chains.a, &mut chains.b);

    let conn_a = a.add_test_connection(&client_a, &client_b);
    let conn_b = b.add_test_connection(&client_b, &client_a);

    let mut handshake = ConnectionHandshake::new(conn_a.clone(), conn_b.clone());
    handshake.complete_handshake(a, b).await.unwrap();
    assert_eq!(handshake.state(), HandshakeState::Open);

    for (agent, connection) in [(&*a, &conn_a), (&*b, &conn_b)] {
        let end = agent.backend().query_connection(&connection.id).await.unwrap().unwrap();
        assert!(end.is_open());
        assert_eq!(end.versions, vec![ordered_only.clone()]);
    }
}

#[tokio::test]
async fn test_try_with_tampered_proof_is_rejected() {
    let mut chains = setup_producing(Duration::from_millis(10));
    let (client_a, client_b) = create_clients(&mut chains).await;
    let (a, b) = (&mut chains.a, &mut chains.b);

    let conn_a = a.add_test_connection(&client_a, &client_b);
    let conn_b = b.add_test_connection(&client_b, &client_a);
    a.connection_open_init(b, &conn_a, &conn_b).await.unwrap();

    a.update_header().await.unwrap();
    b.update_besu_client(a, &client_b).await.unwrap();
    let mut msg = try_msg(a, b, &conn_a, &conn_b).await;
    msg.proof_init = tamper(&msg.proof_init);

    let err = b.submit_and_wait(IbcMsg::ConnectionOpenTry(msg)).await.unwrap_err();
    let reason = failure_reason(err);
    assert!(reason.contains("membership verification failed"), "unexpected reason: {}", reason);
    assert!(b.backend().query_connection(&conn_b.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_try_at_untrusted_height_is_rejected() {
    let mut chains = setup_producing(Duration::from_millis(10));
    let (client_a, client_b) = create_clients(&mut chains).await;
    let (a, b) = (&mut chains.a, &mut chains.b);

    let conn_a = a.add_test_connection(&client_a, &client_b);
    let conn_b = b.add_test_connection(&client_b, &client_a);
    a.connection_open_init(b, &conn_a, &conn_b).await.unwrap();

    a.update_header().await.unwrap();
    b.update_besu_client(a, &client_b).await.unwrap();
    let mut msg = try_msg(a, b, &conn_a, &conn_b).await;
    // No consensus state was ever stored this far ahead
    msg.proof_height += 1_000;

    let err = b.submit_and_wait(IbcMsg::ConnectionOpenTry(msg)).await.unwrap_err();
    let reason = failure_reason(err);
    assert!(reason.contains("consensus state"), "unexpected reason: {}", reason);
    assert!(b.backend().query_connection(&conn_b.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_ack_with_tampered_proof_leaves_connection_in_init() {
    let mut chains = setup_producing(Duration::from_millis(10));
    let (client_a, client_b) = create_clients(&mut chains).await;
    let (a, b) = (&mut chains.a, &mut chains.b);

    let conn_a = a.add_test_connection(&client_a, &client_b);
    let conn_b = b.add_test_connection(&client_b, &client_a);
    a.connection_open_init(b, &conn_a, &conn_b).await.unwrap();

    a.update_header().await.unwrap();
    b.update_besu_client(a, &client_b).await.unwrap();
    b.connection_open_try(a, &conn_b, &conn_a).await.unwrap();

    b.update_header().await.unwrap();
    a.update_besu_client(b, &client_a).await.unwrap();
    let key = a.connection_state_commitment_slot(&conn_b.id).await.unwrap();
    let proof = b.query_proof(a, &client_a, &key).await.unwrap();
    let version = b.backend().query_connection(&conn_b.id).await.unwrap().unwrap().versions[0].clone();
    let msg = MsgConnectionOpenAck {
        connection_id: conn_a.id.clone(),
        counterparty_connection_id: conn_b.id.clone(),
        version,
        proof_height: proof.height,
        proof_try: tamper(&proof.data),
    };

    let err = a.submit_and_wait(IbcMsg::ConnectionOpenAck(msg)).await.unwrap_err();
    let reason = failure_reason(err);
    assert!(reason.contains("membership verification failed"), "unexpected reason: {}", reason);

    let end_a = a.backend().query_connection(&conn_a.id).await.unwrap().unwrap();
    assert_eq!(end_a.state, State::Init);
}
