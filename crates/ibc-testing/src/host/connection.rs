// ICS-03 connection handlers
// Each proof-carrying step rebuilds the connection end the counterparty must
// have committed and checks it against the counterparty's storage proof.

use tracing::{debug, info};

use super::{HostError, IbcHost};
use crate::commitment::{connection_path, MerklePrefix};
use crate::types::version::{pick_version, VersionError};
use crate::types::{
    ConnectionEnd, Counterparty, MsgConnectionOpenAck, MsgConnectionOpenConfirm,
    MsgConnectionOpenInit, MsgConnectionOpenTry, State,
};

impl IbcHost {
    /// Step 1: record a new connection in INIT
    pub fn conn_open_init(&mut self, msg: &MsgConnectionOpenInit) -> Result<(), HostError> {
        self.ensure_client(&msg.client_id)?;
        self.ensure_connection_free(&msg.connection_id)?;

        if msg.versions.is_empty() {
            return Err(VersionError::EmptyVersions.into());
        }
        for version in &msg.versions {
            version.verify_is_supported(&self.supported_versions)?;
        }

        let end = ConnectionEnd::new(
            State::Init,
            msg.client_id.clone(),
            msg.counterparty.clone(),
            msg.versions.clone(),
            msg.delay_period,
        );
        self.store_connection(&msg.connection_id, end)
    }

    /// Step 2: verify the counterparty's INIT and record TRYOPEN
    pub fn conn_open_try(&mut self, msg: &MsgConnectionOpenTry) -> Result<(), HostError> {
        self.ensure_client(&msg.client_id)?;
        self.ensure_connection_free(&msg.connection_id)?;

        let counterparty_connection_id = msg
            .counterparty
            .connection_id
            .as_deref()
            .ok_or_else(|| HostError::MissingCounterpartyConnectionId(msg.connection_id.clone()))?;

        let expected = ConnectionEnd::new(
            State::Init,
            msg.counterparty.client_id.clone(),
            Counterparty::new(msg.client_id.clone(), None, self.prefix().clone()),
            msg.counterparty_versions.clone(),
            msg.delay_period,
        );
        self.verify_connection_state(
            &msg.client_id,
            msg.proof_height,
            &msg.counterparty.prefix,
            counterparty_connection_id,
            &expected,
            &msg.proof_init,
        )?;

        let version = pick_version(&self.supported_versions, &msg.counterparty_versions)?;
        debug!("Negotiated version {} for {}", version.identifier, msg.connection_id);

        let end = ConnectionEnd::new(
            State::TryOpen,
            msg.client_id.clone(),
            msg.counterparty.clone(),
            vec![version],
            msg.delay_period,
        );
        self.store_connection(&msg.connection_id, end)
    }

    /// Step 3: verify the counterparty's TRYOPEN and open our end
    pub fn conn_open_ack(&mut self, msg: &MsgConnectionOpenAck) -> Result<(), HostError> {
        let mut end = self.connection_in_state(&msg.connection_id, State::Init)?;
        msg.version.verify_is_supported(&end.versions)?;

        let expected = ConnectionEnd::new(
            State::TryOpen,
            end.counterparty.client_id.clone(),
            Counterparty::new(
                end.client_id.clone(),
                Some(msg.connection_id.clone()),
                self.prefix().clone(),
            ),
            vec![msg.version.clone()],
            end.delay_period,
        );
        self.verify_connection_state(
            &end.client_id,
            msg.proof_height,
            &end.counterparty.prefix,
            &msg.counterparty_connection_id,
            &expected,
            &msg.proof_try,
        )?;

        end.state = State::Open;
        end.counterparty.connection_id = Some(msg.counterparty_connection_id.clone());
        end.versions = vec![msg.version.clone()];
        self.store_connection(&msg.connection_id, end)
    }

    /// Step 4: verify the counterparty's OPEN and open our end
    pub fn conn_open_confirm(&mut self, msg: &MsgConnectionOpenConfirm) -> Result<(), HostError> {
        let mut end = self.connection_in_state(&msg.connection_id, State::TryOpen)?;
        let counterparty_connection_id = end
            .counterparty
            .connection_id
            .clone()
            .ok_or_else(|| HostError::MissingCounterpartyConnectionId(msg.connection_id.clone()))?;

        let expected = ConnectionEnd::new(
            State::Open,
            end.counterparty.client_id.clone(),
            Counterparty::new(
                end.client_id.clone(),
                Some(msg.connection_id.clone()),
                self.prefix().clone(),
            ),
            end.versions.clone(),
            end.delay_period,
        );
        self.verify_connection_state(
            &end.client_id,
            msg.proof_height,
            &end.counterparty.prefix,
            &counterparty_connection_id,
            &expected,
            &msg.proof_ack,
        )?;

        end.state = State::Open;
        self.store_connection(&msg.connection_id, end)
    }

    fn verify_connection_state(
        &self,
        client_id: &str,
        proof_height: u64,
        prefix: &MerklePrefix,
        connection_id: &str,
        expected: &ConnectionEnd,
        proof: &[u8],
    ) -> Result<(), HostError> {
        let value = expected.encode()?;
        self.verify_membership(
            client_id,
            proof_height,
            prefix,
            &connection_path(connection_id),
            &value,
            proof,
        )
    }

    fn ensure_client(&self, client_id: &str) -> Result<(), HostError> {
        if self.clients.contains_key(client_id) {
            Ok(())
        } else {
            Err(HostError::ClientNotFound(client_id.to_string()))
        }
    }

    fn ensure_connection_free(&self, connection_id: &str) -> Result<(), HostError> {
        if self.connections.contains_key(connection_id) {
            return Err(HostError::ConnectionAlreadyExists(connection_id.to_string()));
        }
        Ok(())
    }

    fn connection_in_state(&self, connection_id: &str, expected: State) -> Result<ConnectionEnd, HostError> {
        let end = self
            .connections
            .get(connection_id)
            .ok_or_else(|| HostError::ConnectionNotFound(connection_id.to_string()))?;
        if end.state != expected {
            return Err(HostError::InvalidConnectionState {
                connection_id: connection_id.to_string(),
                expected,
                actual: end.state,
            });
        }
        Ok(end.clone())
    }

    fn store_connection(&mut self, connection_id: &str, end: ConnectionEnd) -> Result<(), HostError> {
        let encoded = end.encode()?;
        self.store.commit(&connection_path(connection_id), &encoded);
        info!("🔗 Connection {} is now {}", connection_id, end.state);
        self.connections.insert(connection_id.to_string(), end);
        Ok(())
    }
}
