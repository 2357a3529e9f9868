// Chain agent: one ledger's identity, synchronized header snapshot and the
// clients and connections it has created. Relay operations are implemented
// on this type in the relay modules.

use std::sync::Arc;
use tracing::{debug, info};

use crate::chains::{ChainBackend, ContractState, Receipt};
use crate::commitment::MerklePrefix;
use crate::config::{ChainConfig, ContractConfig, HandshakeConfig, HarnessConfig, SyncOptions};
use crate::error::{HarnessError, Result};
use crate::keystore::Signer;
use crate::relay::sync::fetch_newer_state;
use crate::types::{IbcMsg, ParsedHeader, ValidatorKey, Version};

/// Connection an agent has allocated an identifier for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestConnection {
    pub id: String,
    pub client_id: String,
    pub next_channel_version: String,
    pub counterparty_client_id: String,
}

pub struct ChainAgent {
    chain_id: u64,
    backend: Arc<dyn ChainBackend>,
    signer: Signer,
    contracts: ContractConfig,
    handshake: HandshakeConfig,
    sync: SyncOptions,
    /// Latest synchronized snapshot, replaced only by `update_header`
    last_contract_state: Option<ContractState>,
    client_ids: Vec<String>,
    connections: Vec<TestConnection>,
    client_sequence: u64,
    connection_sequence: u64,
    nonce: u64,
}

impl ChainAgent {
    pub fn new(
        backend: Arc<dyn ChainBackend>,
        chain: &ChainConfig,
        handshake: HandshakeConfig,
        sync: SyncOptions,
    ) -> Result<Self> {
        if backend.chain_id() != chain.chain_id {
            return Err(HarnessError::Config(format!(
                "backend serves chain {} but config is for chain {}",
                backend.chain_id(),
                chain.chain_id
            )));
        }
        let signer = Signer::from_mnemonic(&chain.mnemonic, &chain.hd_path)?;
        info!(
            "🔑 Agent for chain {} signing as {}",
            chain.chain_id,
            signer.address()
        );

        Ok(Self {
            chain_id: chain.chain_id,
            backend,
            signer,
            contracts: chain.contracts,
            handshake,
            sync,
            last_contract_state: None,
            client_ids: Vec::new(),
            connections: Vec::new(),
            client_sequence: 0,
            connection_sequence: 0,
            nonce: 0,
        })
    }

    /// Build the agent for the backend's chain from a harness configuration
    pub fn from_config(backend: Arc<dyn ChainBackend>, config: &HarnessConfig) -> Result<Self> {
        let chain_id = backend.chain_id();
        let chain = config
            .get_chain(chain_id)
            .ok_or_else(|| HarnessError::Config(format!("chain {} is not configured", chain_id)))?;
        Self::new(
            backend,
            chain,
            config.handshake.clone(),
            config.global.sync_options(),
        )
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn chain_id_string(&self) -> String {
        self.chain_id.to_string()
    }

    pub fn commitment_prefix(&self) -> MerklePrefix {
        MerklePrefix::from(self.handshake.commitment_prefix.as_str())
    }

    pub fn supported_versions(&self) -> &[Version] {
        &self.handshake.versions
    }

    pub fn handshake_config(&self) -> &HandshakeConfig {
        &self.handshake
    }

    pub fn sync_options(&self) -> SyncOptions {
        self.sync
    }

    pub fn contracts(&self) -> &ContractConfig {
        &self.contracts
    }

    pub fn backend(&self) -> &Arc<dyn ChainBackend> {
        &self.backend
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Nonce the next submitted transaction will carry
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn client_ids(&self) -> &[String] {
        &self.client_ids
    }

    pub fn connections(&self) -> &[TestConnection] {
        &self.connections
    }

    pub fn get_connection(&self, connection_id: &str) -> Option<&TestConnection> {
        self.connections.iter().find(|c| c.id == connection_id)
    }

    /// The synchronized snapshot, or `HeaderNotSynced` before the first `update_header`
    pub fn last_contract_state(&self) -> Result<&ContractState> {
        self.last_contract_state
            .as_ref()
            .ok_or(HarnessError::HeaderNotSynced {
                chain_id: self.chain_id,
            })
    }

    pub fn last_header(&self) -> Result<&ParsedHeader> {
        Ok(&self.last_contract_state()?.parsed_header)
    }

    pub fn last_validators(&self) -> Result<&[ValidatorKey]> {
        Ok(&self.last_header()?.validators)
    }

    /// Wait for a header strictly newer than the cached one and swap it in
    pub async fn update_header(&mut self) -> Result<&ContractState> {
        let current = self.last_contract_state.as_ref().map(ContractState::height);
        let state = fetch_newer_state(
            self.backend.as_ref(),
            &self.contracts.provable_store_address,
            current,
            self.sync.timeout,
            self.sync.poll_interval,
        )
        .await?;

        debug!("Chain {} synchronized to height {}", self.chain_id, state.height());
        Ok(&*self.last_contract_state.insert(state))
    }

    /// Allocate `{client_type}-{sequence}-{unix}` and record it
    pub fn new_client_id(&mut self, client_type: &str) -> String {
        let client_id = format!(
            "{}-{}-{}",
            client_type,
            self.client_sequence,
            chrono::Utc::now().timestamp()
        );
        self.client_sequence += 1;
        self.client_ids.push(client_id.clone());
        client_id
    }

    /// Allocate the next connection and track it
    pub fn add_test_connection(&mut self, client_id: &str, counterparty_client_id: &str) -> TestConnection {
        let connection = self.construct_next_test_connection(client_id, counterparty_client_id);
        self.connections.push(connection.clone());
        connection
    }

    /// Allocate `connection-{sequence}-{unix}` without tracking it
    pub fn construct_next_test_connection(
        &mut self,
        client_id: &str,
        counterparty_client_id: &str,
    ) -> TestConnection {
        let id = format!(
            "connection-{}-{}",
            self.connection_sequence,
            chrono::Utc::now().timestamp()
        );
        self.connection_sequence += 1;
        TestConnection {
            id,
            client_id: client_id.to_string(),
            next_channel_version: self.handshake.channel_version.clone(),
            counterparty_client_id: counterparty_client_id.to_string(),
        }
    }

    /// Sign, submit and wait for inclusion; a reverted transaction is an error
    pub async fn submit_and_wait(&mut self, msg: IbcMsg) -> Result<Receipt> {
        let to = if msg.is_client_msg() {
            self.contracts.ibc_client_address
        } else {
            self.contracts.ibc_connection_address
        };
        let name = msg.name();
        let tx = self.signer.sign_tx(to, self.nonce, msg)?;

        let tx_hash = self.backend.submit_transaction(tx).await?;
        self.nonce += 1;
        debug!("Chain {} accepted {} as {}", self.chain_id, name, tx_hash);

        let receipt = tokio::time::timeout(self.sync.tx_timeout, self.backend.wait_for_receipt(&tx_hash))
            .await
            .map_err(|_| HarnessError::InclusionTimeout {
                tx_hash: tx_hash.to_string(),
                waited: self.sync.tx_timeout,
            })??;

        if !receipt.is_success() {
            return Err(HarnessError::TxFailed {
                tx_hash: tx_hash.to_string(),
                reason: receipt
                    .error
                    .clone()
                    .unwrap_or_else(|| "transaction reverted".to_string()),
            });
        }
        Ok(receipt)
    }
}
