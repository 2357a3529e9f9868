// IBC connection handshake: the four ICS-03 steps and a driver running them in order
// Each proof-carrying step proves the counterparty's connection commitment at
// the height our client of the counterparty has reached.

use tracing::{error, info};

use crate::agent::{ChainAgent, TestConnection};
use crate::error::{HarnessError, Result};
use crate::types::{
    Counterparty, IbcMsg, MsgConnectionOpenAck, MsgConnectionOpenConfirm, MsgConnectionOpenInit,
    MsgConnectionOpenTry,
};

impl ChainAgent {
    /// Init: record `connection` on this chain, offering the configured versions
    pub async fn connection_open_init(
        &mut self,
        counterparty: &ChainAgent,
        connection: &TestConnection,
        _counterparty_connection: &TestConnection,
    ) -> Result<()> {
        let msg = MsgConnectionOpenInit {
            client_id: connection.client_id.clone(),
            connection_id: connection.id.clone(),
            counterparty: Counterparty::new(
                connection.counterparty_client_id.clone(),
                None,
                counterparty.commitment_prefix(),
            ),
            versions: self.supported_versions().to_vec(),
            delay_period: self.handshake_config().delay_period,
        };
        self.submit_and_wait(IbcMsg::ConnectionOpenInit(msg)).await?;
        Ok(())
    }

    /// Try: prove the counterparty's INIT and record TRYOPEN here
    pub async fn connection_open_try(
        &mut self,
        counterparty: &ChainAgent,
        connection: &TestConnection,
        counterparty_connection: &TestConnection,
    ) -> Result<()> {
        let key = self
            .connection_state_commitment_slot(&counterparty_connection.id)
            .await?;
        let proof = counterparty
            .query_proof(self, &connection.client_id, &key)
            .await?;

        let msg = MsgConnectionOpenTry {
            connection_id: connection.id.clone(),
            counterparty: Counterparty::new(
                counterparty_connection.client_id.clone(),
                Some(counterparty_connection.id.clone()),
                counterparty.commitment_prefix(),
            ),
            delay_period: self.handshake_config().delay_period,
            client_id: connection.client_id.clone(),
            counterparty_versions: counterparty.supported_versions().to_vec(),
            proof_height: proof.height,
            proof_init: proof.data,
        };
        self.submit_and_wait(IbcMsg::ConnectionOpenTry(msg)).await?;
        Ok(())
    }

    /// Ack: prove the counterparty's TRYOPEN and open our end
    pub async fn connection_open_ack(
        &mut self,
        counterparty: &ChainAgent,
        connection: &TestConnection,
        counterparty_connection: &TestConnection,
    ) -> Result<()> {
        let key = self
            .connection_state_commitment_slot(&counterparty_connection.id)
            .await?;
        let proof = counterparty
            .query_proof(self, &connection.client_id, &key)
            .await?;
        // Echo the version the counterparty negotiated in Try
        let version = counterparty
            .backend()
            .query_connection(&counterparty_connection.id)
            .await?
            .and_then(|end| end.versions.into_iter().next())
            .ok_or_else(|| HarnessError::ConnectionNotFound {
                connection_id: counterparty_connection.id.clone(),
                chain_id: counterparty.chain_id(),
            })?;

        let msg = MsgConnectionOpenAck {
            connection_id: connection.id.clone(),
            counterparty_connection_id: counterparty_connection.id.clone(),
            version,
            proof_height: proof.height,
            proof_try: proof.data,
        };
        self.submit_and_wait(IbcMsg::ConnectionOpenAck(msg)).await?;
        Ok(())
    }

    /// Confirm: prove the counterparty's OPEN and open our end
    pub async fn connection_open_confirm(
        &mut self,
        counterparty: &ChainAgent,
        connection: &TestConnection,
        counterparty_connection: &TestConnection,
    ) -> Result<()> {
        let key = self
            .connection_state_commitment_slot(&counterparty_connection.id)
            .await?;
        let proof = counterparty
            .query_proof(self, &connection.client_id, &key)
            .await?;

        let msg = MsgConnectionOpenConfirm {
            connection_id: connection.id.clone(),
            proof_height: proof.height,
            proof_ack: proof.data,
        };
        self.submit_and_wait(IbcMsg::ConnectionOpenConfirm(msg)).await?;
        Ok(())
    }
}

/// Last handshake step that completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    NotStarted,
    Init,
    TryOpen,
    /// Source end open, destination still TRYOPEN
    AckOpen,
    Open,
}

/// Connection handshake manager
pub struct ConnectionHandshake {
    /// Connection on the source chain (where Init is called)
    src_connection: TestConnection,
    /// Connection on the destination chain (where Try is called)
    dst_connection: TestConnection,
    state: HandshakeState,
}

impl ConnectionHandshake {
    pub fn new(src_connection: TestConnection, dst_connection: TestConnection) -> Self {
        Self {
            src_connection,
            dst_connection,
            state: HandshakeState::NotStarted,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn src_connection(&self) -> &TestConnection {
        &self.src_connection
    }

    pub fn dst_connection(&self) -> &TestConnection {
        &self.dst_connection
    }

    /// Run the remaining steps: Init -> Try -> Ack -> Confirm.
    ///
    /// Before each proof-carrying step the prover's header is synchronized and
    /// the verifier's client is updated to it. A failed step leaves the state
    /// at the last completed step so the handshake can be resumed.
    pub async fn complete_handshake(&mut self, src: &mut ChainAgent, dst: &mut ChainAgent) -> Result<()> {
        info!(
            "🤝 Starting connection handshake {} <-> {}",
            self.src_connection.id, self.dst_connection.id
        );

        while self.state != HandshakeState::Open {
            let (step, result) = match self.state {
                HandshakeState::NotStarted => (
                    "Init",
                    src.connection_open_init(dst, &self.src_connection, &self.dst_connection)
                        .await,
                ),
                HandshakeState::Init => (
                    "Try",
                    Self::proven_step(dst, src, &self.dst_connection, &self.src_connection, Step::Try)
                        .await,
                ),
                HandshakeState::TryOpen => (
                    "Ack",
                    Self::proven_step(src, dst, &self.src_connection, &self.dst_connection, Step::Ack)
                        .await,
                ),
                HandshakeState::AckOpen => (
                    "Confirm",
                    Self::proven_step(dst, src, &self.dst_connection, &self.src_connection, Step::Confirm)
                        .await,
                ),
                HandshakeState::Open => break,
            };

            if let Err(e) = result {
                error!("❌ {} failed: {}", step, e);
                return Err(e);
            }
            self.state = match self.state {
                HandshakeState::NotStarted => HandshakeState::Init,
                HandshakeState::Init => HandshakeState::TryOpen,
                HandshakeState::TryOpen => HandshakeState::AckOpen,
                HandshakeState::AckOpen | HandshakeState::Open => HandshakeState::Open,
            };
            info!("✅ {} completed", step);
        }

        info!("🎉 Connection handshake complete! Connection is now OPEN");
        Ok(())
    }

    async fn proven_step(
        verifier: &mut ChainAgent,
        prover: &mut ChainAgent,
        connection: &TestConnection,
        counterparty_connection: &TestConnection,
        step: Step,
    ) -> Result<()> {
        prover.update_header().await?;
        verifier
            .update_besu_client(prover, &connection.client_id)
            .await?;

        match step {
            Step::Try => {
                verifier
                    .connection_open_try(prover, connection, counterparty_connection)
                    .await
            }
            Step::Ack => {
                verifier
                    .connection_open_ack(prover, connection, counterparty_connection)
                    .await
            }
            Step::Confirm => {
                verifier
                    .connection_open_confirm(prover, connection, counterparty_connection)
                    .await
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Try,
    Ack,
    Confirm,
}
