// Chain-related types
// The collaborator surface an agent needs from one ledger: state reads with
// proofs, transaction submission and the light client / provable store views.

use async_trait::async_trait;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::commitment::{Hash, MerklePrefix, StorageProof};
use crate::types::{AccountProof, Address, ClientState, ConnectionEnd, IbcMsg, ParsedHeader};

pub mod memory;

pub use memory::{InMemoryLedger, LedgerConfig};

/// Errors reported by a chain backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("chain {0} is unreachable")]
    Unreachable(u64),

    #[error("unknown account: {0}")]
    UnknownAccount(Address),

    #[error("height {requested} not available (latest {latest})")]
    HeightNotAvailable { requested: u64, latest: u64 },

    #[error("receipt not found for transaction {0}")]
    ReceiptNotFound(String),

    #[error("invalid transaction signature")]
    InvalidSignature,

    #[error("query failed: {0}")]
    Query(String),
}

/// Snapshot of a chain at one height: header, seals and proofs for the requested keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractState {
    pub parsed_header: ParsedHeader,
    /// Validator signatures over `parsed_header`
    pub commit_seals: Vec<Vec<u8>>,
    /// One proof per requested storage key, in request order
    pub storage_proofs: Vec<StorageProof>,
    pub account_proof: AccountProof,
}

impl ContractState {
    pub fn height(&self) -> u64 {
        self.parsed_header.number
    }

    pub fn sealing_header_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        self.parsed_header.encode()
    }

    pub fn account_proof_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        self.account_proof.encode()
    }

    pub fn storage_proof(&self, index: usize) -> Option<&StorageProof> {
        self.storage_proofs.get(index)
    }
}

/// Signed transaction addressed to one of the IBC contracts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
    /// ed25519 public key of the sender
    pub from: [u8; 32],
    pub to: Address,
    pub nonce: u64,
    pub msg: IbcMsg,
    pub signature: Vec<u8>,
}

#[derive(Serialize)]
struct SigningPayload<'a> {
    from: &'a [u8; 32],
    to: &'a Address,
    nonce: u64,
    msg: &'a IbcMsg,
}

impl SignedTx {
    /// Bytes covered by the sender's signature
    pub fn signing_payload(
        from: &[u8; 32],
        to: &Address,
        nonce: u64,
        msg: &IbcMsg,
    ) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&SigningPayload {
            from,
            to,
            nonce,
            msg,
        })
    }

    pub fn hash(&self) -> Result<TxHash, serde_json::Error> {
        let payload = Self::signing_payload(&self.from, &self.to, self.nonce, &self.msg)?;
        Ok(TxHash(format!(
            "0x{}",
            hex::encode(crate::commitment::sha256(&payload))
        )))
    }

    pub fn verify_signature(&self) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.from) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&self.signature) else {
            return false;
        };
        match Self::signing_payload(&self.from, &self.to, self.nonce, &self.msg) {
            Ok(payload) => key.verify(&payload, &signature).is_ok(),
            Err(_) => false,
        }
    }
}

/// Handle returned by a submission, used to wait for inclusion
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub String);

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Success,
    Failed,
}

/// Inclusion result of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub status: ReceiptStatus,
    /// Revert reason when `status` is `Failed`
    pub error: Option<String>,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

/// Arguments of the light client's client-state verification view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyClientStateRequest {
    /// Client state the caller holds for `client_id`
    pub client_state: ClientState,
    pub client_id: String,
    pub proof_height: u64,
    pub prefix: MerklePrefix,
    /// Client on the counterparty whose committed state is being checked
    pub counterparty_client_id: String,
    pub proof: Vec<u8>,
    /// Client state the counterparty claims to hold
    pub target_client_state: ClientState,
}

/// Generic chain interface for the handshake harness
#[async_trait]
pub trait ChainBackend: Send + Sync {
    /// Get the chain ID
    fn chain_id(&self) -> u64;

    /// Read `address`'s storage at `height` (latest when `None`), with a proof per key
    async fn get_contract_state(
        &self,
        address: &Address,
        storage_keys: &[Hash],
        height: Option<u64>,
    ) -> Result<ContractState, ChainError>;

    /// Submit a signed transaction
    async fn submit_transaction(&self, tx: SignedTx) -> Result<TxHash, ChainError>;

    /// Wait until the transaction is included and return its receipt
    async fn wait_for_receipt(&self, tx_hash: &TxHash) -> Result<Receipt, ChainError>;

    /// Query a client state from the provable store
    async fn query_client_state(&self, client_id: &str) -> Result<Option<ClientState>, ChainError>;

    /// Query a connection end from the provable store
    async fn query_connection(
        &self,
        connection_id: &str,
    ) -> Result<Option<ConnectionEnd>, ChainError>;

    /// Storage slot of a client state commitment
    async fn client_state_commitment_slot(&self, client_id: &str) -> Result<Hash, ChainError>;

    /// Storage slot of a connection commitment
    async fn connection_commitment_slot(&self, connection_id: &str) -> Result<Hash, ChainError>;

    /// Check a counterparty's committed client state against a proof
    async fn verify_client_state(&self, request: VerifyClientStateRequest)
        -> Result<bool, ChainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MsgConnectionOpenConfirm;
    use ed25519_dalek::{Signer, SigningKey};

    fn signed(key: &SigningKey, nonce: u64) -> SignedTx {
        let from = key.verifying_key().to_bytes();
        let to = Address([1u8; 20]);
        let msg = IbcMsg::ConnectionOpenConfirm(MsgConnectionOpenConfirm {
            connection_id: "connection-0-1".to_string(),
            proof_height: 3,
            proof_ack: vec![1, 2, 3],
        });
        let payload = SignedTx::signing_payload(&from, &to, nonce, &msg).unwrap();
        SignedTx {
            from,
            to,
            nonce,
            msg,
            signature: key.sign(&payload).to_bytes().to_vec(),
        }
    }

    #[test]
    fn test_signed_tx_verification() {
        let key = SigningKey::from_bytes(&[5u8; 32]);
        let mut tx = signed(&key, 0);
        assert!(tx.verify_signature());

        tx.nonce = 1;
        assert!(!tx.verify_signature());
    }

    #[test]
    fn test_tx_hash_depends_on_nonce() {
        let key = SigningKey::from_bytes(&[5u8; 32]);
        assert_ne!(signed(&key, 0).hash().unwrap(), signed(&key, 1).hash().unwrap());
    }
}
