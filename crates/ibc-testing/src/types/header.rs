// Block header and account proof as returned by chain state queries

use serde::{Deserialize, Serialize};

use super::client::ValidatorKey;
use super::Address;
use crate::commitment::{sha256, Hash};

/// Contract-level parsed block header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedHeader {
    pub number: u64,
    /// Unix seconds
    pub time: u64,
    /// State root, binding the provable store's storage root via the account proof
    pub root: Hash,
    pub validators: Vec<ValidatorKey>,
}

impl ParsedHeader {
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Digest signed by the sealing validators
    pub fn seal_hash(&self) -> Result<Hash, serde_json::Error> {
        Ok(sha256(&self.encode()?))
    }
}

/// Proof that `storage_root` is the storage root of `address` under a header's state root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProof {
    pub address: Address,
    pub storage_root: Hash,
}

impl AccountProof {
    /// State root implied by this account
    pub fn state_root(&self) -> Hash {
        let mut bytes = Vec::with_capacity(20 + 32);
        bytes.extend_from_slice(self.address.as_bytes());
        bytes.extend_from_slice(&self.storage_root);
        sha256(&bytes)
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
