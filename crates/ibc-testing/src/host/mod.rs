// On-chain side of a ledger: the provable store, the light client module and
// the ICS-03 connection handlers, as executed by the in-memory ledger.

use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::commitment::{client_state_path, connection_path, Hash, MerklePrefix};
use crate::types::{ClientState, ConnectionEnd, ConsensusState, IbcMsg, State, Version, VersionError};

pub mod client;
pub mod connection;
pub mod store;

pub use store::ProvableStore;

/// Errors raised while executing or verifying IBC messages on chain
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("client {0} already exists")]
    ClientAlreadyExists(String),

    #[error("client {0} not found")]
    ClientNotFound(String),

    #[error("invalid client state: {0}")]
    InvalidClientState(String),

    #[error("consensus state for client {client_id} at height {height} not found")]
    ConsensusStateNotFound { client_id: String, height: u64 },

    #[error("header height {header} must be greater than latest height {latest}")]
    HeightNotIncreasing { latest: u64, header: u64 },

    #[error("trusted validator set is empty")]
    EmptyValidatorSet,

    #[error("insufficient commit seals: {signed} valid, {required} required")]
    InsufficientSeals { signed: usize, required: usize },

    #[error("account proof mismatch: {0}")]
    AccountProofMismatch(String),

    #[error("proof height cannot be zero")]
    ZeroProofHeight,

    #[error("invalid proof: {0}")]
    InvalidProof(String),

    #[error("membership verification failed for {path} at height {height}")]
    VerificationFailed { path: String, height: u64 },

    #[error("connection {0} already exists")]
    ConnectionAlreadyExists(String),

    #[error("connection {0} not found")]
    ConnectionNotFound(String),

    #[error("connection {connection_id} is {actual}, expected {expected}")]
    InvalidConnectionState {
        connection_id: String,
        expected: State,
        actual: State,
    },

    #[error("counterparty connection id missing for {0}")]
    MissingCounterpartyConnectionId(String),

    #[error("version negotiation failed: {0}")]
    Version(#[from] VersionError),

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<serde_json::Error> for HostError {
    fn from(err: serde_json::Error) -> Self {
        HostError::Encoding(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ClientRecord {
    pub(crate) client_state: ClientState,
    pub(crate) consensus_states: BTreeMap<u64, ConsensusState>,
}

/// IBC contracts of one chain
#[derive(Debug, Clone)]
pub struct IbcHost {
    store: ProvableStore,
    clients: HashMap<String, ClientRecord>,
    connections: HashMap<String, ConnectionEnd>,
    supported_versions: Vec<Version>,
}

impl IbcHost {
    pub fn new(prefix: MerklePrefix, supported_versions: Vec<Version>) -> Self {
        Self {
            store: ProvableStore::new(prefix),
            clients: HashMap::new(),
            connections: HashMap::new(),
            supported_versions,
        }
    }

    /// Execute a state-changing message
    pub fn execute(&mut self, msg: &IbcMsg) -> Result<(), HostError> {
        match msg {
            IbcMsg::CreateClient(msg) => self.create_client(msg),
            IbcMsg::UpdateClient(msg) => self.update_client(msg).map(|_| ()),
            IbcMsg::ConnectionOpenInit(msg) => self.conn_open_init(msg),
            IbcMsg::ConnectionOpenTry(msg) => self.conn_open_try(msg),
            IbcMsg::ConnectionOpenAck(msg) => self.conn_open_ack(msg),
            IbcMsg::ConnectionOpenConfirm(msg) => self.conn_open_confirm(msg),
        }
    }

    pub fn store(&self) -> &ProvableStore {
        &self.store
    }

    pub fn prefix(&self) -> &MerklePrefix {
        self.store.prefix()
    }

    pub fn supported_versions(&self) -> &[Version] {
        &self.supported_versions
    }

    pub fn client_state(&self, client_id: &str) -> Option<&ClientState> {
        self.clients.get(client_id).map(|record| &record.client_state)
    }

    pub fn consensus_state(&self, client_id: &str, height: u64) -> Option<&ConsensusState> {
        self.clients
            .get(client_id)
            .and_then(|record| record.consensus_states.get(&height))
    }

    pub fn connection(&self, connection_id: &str) -> Option<&ConnectionEnd> {
        self.connections.get(connection_id)
    }

    pub fn client_state_slot(&self, client_id: &str) -> Hash {
        self.store.slot(&client_state_path(client_id))
    }

    pub fn connection_slot(&self, connection_id: &str) -> Hash {
        self.store.slot(&connection_path(connection_id))
    }
}
