// Error types for chain agents and the relay operations they expose

use std::time::Duration;
use thiserror::Error;

use crate::chains::ChainError;
use crate::keystore::KeyError;
use crate::types::VersionError;

/// Errors surfaced to a harness driver
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Storage keys must be `0x`-prefixed hex
    #[error("invalid storage key {key}: {reason}")]
    InvalidStorageKey { key: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    /// An operation needed a synchronized header but none has been fetched
    #[error("chain {chain_id} has no synchronized header")]
    HeaderNotSynced { chain_id: u64 },

    #[error("chain {chain_id} produced no new header within {waited:?}")]
    NoProgress { chain_id: u64, waited: Duration },

    #[error("chain access failed: {0}")]
    Chain(#[from] ChainError),

    #[error("transaction {tx_hash} failed: {reason}")]
    TxFailed { tx_hash: String, reason: String },

    #[error("transaction {tx_hash} not included within {waited:?}")]
    InclusionTimeout { tx_hash: String, waited: Duration },

    #[error("client {client_id} not found on chain {chain_id}")]
    ClientNotFound { client_id: String, chain_id: u64 },

    #[error("connection {connection_id} not found on chain {chain_id}")]
    ConnectionNotFound { connection_id: String, chain_id: u64 },

    /// The counterparty has not committed anything at the requested slot
    #[error("no commitment for key {key} on chain {chain_id} at height {height}")]
    ProofNotFound { key: String, chain_id: u64, height: u64 },

    #[error("version negotiation failed: {0}")]
    Version(#[from] VersionError),

    #[error("key error: {0}")]
    Key(#[from] KeyError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HarnessError {
    /// True for errors caused by a step being attempted before its prerequisite committed
    pub fn is_ordering_error(&self) -> bool {
        matches!(self, HarnessError::ProofNotFound { .. })
    }

    /// True when no further progress can be made against the chain
    pub fn is_liveness_error(&self) -> bool {
        matches!(
            self,
            HarnessError::NoProgress { .. } | HarnessError::Chain(ChainError::Unreachable(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
