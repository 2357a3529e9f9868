// Light client manager: create and update the client tracking a counterparty,
// and cross-check client states committed on both chains.

use tracing::{debug, info, warn};

use crate::agent::ChainAgent;
use crate::chains::{ContractState, VerifyClientStateRequest};
use crate::error::{HarnessError, Result};
use crate::types::{
    Address, ClientHeader, ClientState, ConsensusState, IbcMsg, MsgCreateClient, MsgUpdateClient,
};

/// Build a create-client message from a counterparty snapshot
pub fn construct_msg_create_client(
    client_id: &str,
    counterparty_chain_id: &str,
    counterparty_store_address: Address,
    snapshot: &ContractState,
) -> MsgCreateClient {
    let header = &snapshot.parsed_header;
    MsgCreateClient {
        client_id: client_id.to_string(),
        client_state: ClientState {
            chain_id: counterparty_chain_id.to_string(),
            provable_store_address: counterparty_store_address,
            latest_height: header.number,
        },
        consensus_state: ConsensusState {
            timestamp: header.time,
            root: snapshot.account_proof.storage_root,
            validators: header.validators.clone(),
        },
    }
}

/// Build an update-client message carrying `snapshot`'s header, seals and account proof
pub fn construct_msg_update_client(
    client_id: &str,
    snapshot: &ContractState,
    trusted_height: u64,
) -> Result<MsgUpdateClient> {
    Ok(MsgUpdateClient {
        client_id: client_id.to_string(),
        header: ClientHeader {
            sealing_header: snapshot.sealing_header_bytes()?,
            seals: snapshot.commit_seals.clone(),
            trusted_height,
            account_state_proof: snapshot.account_proof_bytes()?,
        },
    })
}

impl ChainAgent {
    /// Create a client of the configured type for `counterparty`
    pub async fn create_besu_client(&mut self, counterparty: &ChainAgent) -> Result<String> {
        let client_type = self.handshake_config().client_type.clone();
        let client_id = self.new_client_id(&client_type);
        self.create_client(counterparty, &client_id).await?;
        Ok(client_id)
    }

    /// Create `client_id` from the counterparty's synchronized snapshot
    pub async fn create_client(&mut self, counterparty: &ChainAgent, client_id: &str) -> Result<()> {
        let msg = construct_msg_create_client(
            client_id,
            &counterparty.chain_id_string(),
            counterparty.contracts().provable_store_address,
            counterparty.last_contract_state()?,
        );
        let height = msg.client_state.latest_height;

        self.submit_and_wait(IbcMsg::CreateClient(msg)).await?;
        info!(
            "✅ Created client {} on chain {} for chain {} at height {}",
            client_id,
            self.chain_id(),
            counterparty.chain_id(),
            height
        );
        Ok(())
    }

    /// Advance `client_id` to the counterparty's synchronized header
    pub async fn update_besu_client(&mut self, counterparty: &ChainAgent, client_id: &str) -> Result<()> {
        let trusted_height = self.get_client_state(client_id).await?.latest_height;
        let snapshot = counterparty.last_contract_state()?;
        let msg = construct_msg_update_client(client_id, snapshot, trusted_height)?;

        self.submit_and_wait(IbcMsg::UpdateClient(msg)).await?;
        info!(
            "🔄 Updated client {} on chain {}: {} -> {}",
            client_id,
            self.chain_id(),
            trusted_height,
            snapshot.height()
        );
        Ok(())
    }

    /// Client state committed on this chain
    pub async fn get_client_state(&self, client_id: &str) -> Result<ClientState> {
        self.backend()
            .query_client_state(client_id)
            .await?
            .ok_or_else(|| HarnessError::ClientNotFound {
                client_id: client_id.to_string(),
                chain_id: self.chain_id(),
            })
    }

    /// Check that `counterparty` commits, for `counterparty_client_id`, the
    /// client state it reports for itself, proven against our client.
    pub async fn verify_client_state(
        &mut self,
        client_id: &str,
        counterparty: &mut ChainAgent,
        counterparty_client_id: &str,
    ) -> Result<bool> {
        let target = counterparty.get_client_state(counterparty_client_id).await?;
        self.verify_client_state_against(client_id, counterparty, counterparty_client_id, target)
            .await
    }

    /// Like `verify_client_state` but with a caller-supplied claimed state
    pub async fn verify_client_state_against(
        &mut self,
        client_id: &str,
        counterparty: &mut ChainAgent,
        counterparty_client_id: &str,
        claimed: ClientState,
    ) -> Result<bool> {
        self.update_header().await?;
        counterparty.update_header().await?;
        self.update_besu_client(counterparty, client_id).await?;

        let key = counterparty
            .client_state_commitment_slot(counterparty_client_id)
            .await?;
        let proof = counterparty.query_proof(self, client_id, &key).await?;
        let client_state = self.get_client_state(client_id).await?;

        let request = VerifyClientStateRequest {
            client_state,
            client_id: client_id.to_string(),
            proof_height: proof.height,
            prefix: counterparty.commitment_prefix(),
            counterparty_client_id: counterparty_client_id.to_string(),
            proof: proof.data,
            target_client_state: claimed,
        };
        let verified = self.backend().verify_client_state(request).await?;

        if verified {
            debug!(
                "Client state of {} on chain {} verified at height {}",
                counterparty_client_id,
                counterparty.chain_id(),
                proof.height
            );
        } else {
            warn!(
                "Client state of {} on chain {} does not match its commitment",
                counterparty_client_id,
                counterparty.chain_id()
            );
        }
        Ok(verified)
    }
}
