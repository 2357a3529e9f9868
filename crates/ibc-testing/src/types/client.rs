// Light client state types

use serde::{Deserialize, Serialize};

use super::Address;
use crate::commitment::{sha256, Hash};

/// ed25519 public key of a sealing validator
pub type ValidatorKey = [u8; 32];

/// Client state tracked on one chain for its counterparty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientState {
    /// Counterparty chain identifier
    pub chain_id: String,
    /// Address of the counterparty's provable store contract
    pub provable_store_address: Address,
    /// Highest counterparty header incorporated so far
    pub latest_height: u64,
}

impl ClientState {
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Value committed to the provable store for this client state
    pub fn commitment(&self) -> Result<Hash, serde_json::Error> {
        Ok(sha256(&self.encode()?))
    }
}

/// Counterparty consensus state at one height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusState {
    pub timestamp: u64,
    /// Storage root of the counterparty's provable store
    pub root: Hash,
    pub validators: Vec<ValidatorKey>,
}

/// Header update submitted with `MsgUpdateClient`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientHeader {
    /// Encoded `ParsedHeader` the seals were produced over
    pub sealing_header: Vec<u8>,
    /// Validator signatures over the sealing header
    pub seals: Vec<Vec<u8>>,
    /// Height of the trusted consensus state used to check the seals
    pub trusted_height: u64,
    /// Encoded `AccountProof` binding the store's storage root to the header
    pub account_state_proof: Vec<u8>,
}
