// In-process ledger implementing ChainBackend
// Every transaction is sealed into its own block and every block keeps a
// snapshot of the provable store so historical heights can be proven.

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    ChainBackend, ChainError, ContractState, Receipt, ReceiptStatus, SignedTx, TxHash,
    VerifyClientStateRequest,
};
use crate::commitment::{client_state_path, connection_path, sha256, Hash, MerklePrefix};
use crate::config::ContractConfig;
use crate::host::{IbcHost, ProvableStore};
use crate::types::{AccountProof, Address, ClientState, ConnectionEnd, ParsedHeader, ValidatorKey, Version};

/// Height of the first block
pub const GENESIS_HEIGHT: u64 = 1;

/// Configuration for an in-memory ledger
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub chain_id: u64,
    pub contracts: ContractConfig,
    pub prefix: MerklePrefix,
    pub validator_count: usize,
    pub supported_versions: Vec<Version>,
}

impl LedgerConfig {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            contracts: ContractConfig::for_test_chain(chain_id),
            prefix: MerklePrefix::default(),
            validator_count: 4,
            supported_versions: Version::compatibles(),
        }
    }
}

#[derive(Debug, Clone)]
struct Block {
    header: ParsedHeader,
    seals: Vec<Vec<u8>>,
    store: ProvableStore,
}

struct LedgerState {
    host: IbcHost,
    blocks: Vec<Block>,
    receipts: HashMap<TxHash, Receipt>,
    sealing_validators: usize,
}

impl LedgerState {
    fn latest_height(&self) -> u64 {
        self.blocks
            .last()
            .map(|block| block.header.number)
            .unwrap_or(0)
    }

    fn block_at(&self, height: Option<u64>) -> Result<&Block, ChainError> {
        let latest = self.latest_height();
        let requested = height.unwrap_or(latest);
        if requested < GENESIS_HEIGHT || requested > latest {
            return Err(ChainError::HeightNotAvailable { requested, latest });
        }
        self.blocks
            .get((requested - GENESIS_HEIGHT) as usize)
            .ok_or(ChainError::HeightNotAvailable { requested, latest })
    }

    /// Seal the current store into a new block and return its height
    fn seal_block(
        &mut self,
        validators: &[SigningKey],
        store_address: Address,
    ) -> Result<u64, ChainError> {
        let number = self.latest_height() + 1;
        let previous_time = self.blocks.last().map(|b| b.header.time).unwrap_or(0);
        let time = u64::try_from(chrono::Utc::now().timestamp())
            .unwrap_or(0)
            .max(previous_time);

        let store = self.host.store().clone();
        let account = AccountProof {
            address: store_address,
            storage_root: store.storage_root(),
        };
        let header = ParsedHeader {
            number,
            time,
            root: account.state_root(),
            validators: validators
                .iter()
                .map(|key| key.verifying_key().to_bytes())
                .collect(),
        };

        let digest = header
            .seal_hash()
            .map_err(|e| ChainError::Query(e.to_string()))?;
        let seals = validators
            .iter()
            .take(self.sealing_validators)
            .map(|key| key.sign(&digest).to_bytes().to_vec())
            .collect();

        self.blocks.push(Block {
            header,
            seals,
            store,
        });
        Ok(number)
    }
}

/// Single-process ledger with IBFT-style sealed blocks
pub struct InMemoryLedger {
    chain_id: u64,
    contracts: ContractConfig,
    validators: Vec<SigningKey>,
    reachable: AtomicBool,
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(config: LedgerConfig) -> Result<Self, ChainError> {
        let validators: Vec<SigningKey> = (0..config.validator_count)
            .map(|index| {
                let seed = sha256(format!("validator/{}/{}", config.chain_id, index).as_bytes());
                SigningKey::from_bytes(&seed)
            })
            .collect();

        let mut state = LedgerState {
            host: IbcHost::new(config.prefix, config.supported_versions),
            blocks: Vec::new(),
            receipts: HashMap::new(),
            sealing_validators: validators.len(),
        };
        state.seal_block(&validators, config.contracts.provable_store_address)?;

        info!(
            "⛓️ Started in-memory ledger {} with {} validators",
            config.chain_id,
            validators.len()
        );

        Ok(Self {
            chain_id: config.chain_id,
            contracts: config.contracts,
            validators,
            reachable: AtomicBool::new(true),
            state: Mutex::new(state),
        })
    }

    pub fn contracts(&self) -> &ContractConfig {
        &self.contracts
    }

    pub fn validator_keys(&self) -> Vec<ValidatorKey> {
        self.validators
            .iter()
            .map(|key| key.verifying_key().to_bytes())
            .collect()
    }

    pub async fn latest_height(&self) -> u64 {
        self.state.lock().await.latest_height()
    }

    /// Seal an empty block
    pub async fn mine_block(&self) -> Result<u64, ChainError> {
        self.ensure_reachable()?;
        let mut state = self.state.lock().await;
        let height = state.seal_block(&self.validators, self.contracts.provable_store_address)?;
        debug!("Chain {} sealed block {}", self.chain_id, height);
        Ok(height)
    }

    /// Seal empty blocks every `interval` until the handle is aborted
    pub fn spawn_block_production(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let ledger = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !ledger.is_reachable() {
                    continue;
                }
                if let Err(e) = ledger.mine_block().await {
                    warn!("Chain {} failed to seal block: {}", ledger.chain_id, e);
                }
            }
        })
    }

    /// Simulate the node going offline or coming back
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    /// Limit how many validators seal subsequent blocks
    pub async fn set_sealing_validators(&self, count: usize) {
        let mut state = self.state.lock().await;
        state.sealing_validators = count.min(self.validators.len());
    }

    fn ensure_reachable(&self) -> Result<(), ChainError> {
        if self.is_reachable() {
            Ok(())
        } else {
            Err(ChainError::Unreachable(self.chain_id))
        }
    }

    fn contract_for(&self, tx: &SignedTx) -> Address {
        if tx.msg.is_client_msg() {
            self.contracts.ibc_client_address
        } else {
            self.contracts.ibc_connection_address
        }
    }
}

#[async_trait]
impl ChainBackend for InMemoryLedger {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn get_contract_state(
        &self,
        address: &Address,
        storage_keys: &[Hash],
        height: Option<u64>,
    ) -> Result<ContractState, ChainError> {
        self.ensure_reachable()?;
        if *address != self.contracts.provable_store_address {
            return Err(ChainError::UnknownAccount(*address));
        }

        let state = self.state.lock().await;
        let block = state.block_at(height)?;

        Ok(ContractState {
            parsed_header: block.header.clone(),
            commit_seals: block.seals.clone(),
            storage_proofs: storage_keys.iter().map(|key| block.store.prove(key)).collect(),
            account_proof: AccountProof {
                address: *address,
                storage_root: block.store.storage_root(),
            },
        })
    }

    async fn submit_transaction(&self, tx: SignedTx) -> Result<TxHash, ChainError> {
        self.ensure_reachable()?;
        if !tx.verify_signature() {
            return Err(ChainError::InvalidSignature);
        }
        let tx_hash = tx.hash().map_err(|e| ChainError::Query(e.to_string()))?;

        let mut state = self.state.lock().await;
        let expected = self.contract_for(&tx);
        let outcome = if tx.to != expected {
            Err(format!("contract {} does not handle {}", tx.to, tx.msg.name()))
        } else {
            // Execute against a copy so a failing message leaves no partial writes
            let mut host = state.host.clone();
            match host.execute(&tx.msg) {
                Ok(()) => {
                    state.host = host;
                    Ok(())
                }
                Err(e) => Err(e.to_string()),
            }
        };

        let block_number = state.seal_block(&self.validators, self.contracts.provable_store_address)?;
        let receipt = match outcome {
            Ok(()) => {
                info!(
                    "📦 Chain {} included {} in block {}",
                    self.chain_id,
                    tx.msg.name(),
                    block_number
                );
                Receipt {
                    tx_hash: tx_hash.clone(),
                    block_number,
                    status: ReceiptStatus::Success,
                    error: None,
                }
            }
            Err(reason) => {
                warn!(
                    "Chain {} reverted {} in block {}: {}",
                    self.chain_id,
                    tx.msg.name(),
                    block_number,
                    reason
                );
                Receipt {
                    tx_hash: tx_hash.clone(),
                    block_number,
                    status: ReceiptStatus::Failed,
                    error: Some(reason),
                }
            }
        };
        state.receipts.insert(tx_hash.clone(), receipt);
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: &TxHash) -> Result<Receipt, ChainError> {
        self.ensure_reachable()?;
        let state = self.state.lock().await;
        state
            .receipts
            .get(tx_hash)
            .cloned()
            .ok_or_else(|| ChainError::ReceiptNotFound(tx_hash.to_string()))
    }

    async fn query_client_state(&self, client_id: &str) -> Result<Option<ClientState>, ChainError> {
        self.ensure_reachable()?;
        let state = self.state.lock().await;
        Ok(state.host.client_state(client_id).cloned())
    }

    async fn query_connection(
        &self,
        connection_id: &str,
    ) -> Result<Option<ConnectionEnd>, ChainError> {
        self.ensure_reachable()?;
        let state = self.state.lock().await;
        Ok(state.host.connection(connection_id).cloned())
    }

    async fn client_state_commitment_slot(&self, client_id: &str) -> Result<Hash, ChainError> {
        self.ensure_reachable()?;
        let state = self.state.lock().await;
        Ok(state.host.store().slot(&client_state_path(client_id)))
    }

    async fn connection_commitment_slot(&self, connection_id: &str) -> Result<Hash, ChainError> {
        self.ensure_reachable()?;
        let state = self.state.lock().await;
        Ok(state.host.store().slot(&connection_path(connection_id)))
    }

    async fn verify_client_state(
        &self,
        request: VerifyClientStateRequest,
    ) -> Result<bool, ChainError> {
        self.ensure_reachable()?;
        let state = self.state.lock().await;
        state
            .host
            .verify_client_state(&request)
            .map_err(|e| ChainError::Query(e.to_string()))
    }
}
