// IBC connection handshake test harness
// Chain agents that create light clients on each other, keep them updated and
// drive the ICS-03 connection handshake with storage proofs.

pub mod agent;
pub mod chains;
pub mod commitment;
pub mod config;
pub mod error;
pub mod host;
pub mod keystore;
pub mod relay;
pub mod types;

// Re-export commonly used types for convenience
pub use agent::{ChainAgent, TestConnection};
pub use chains::{ChainBackend, ChainError, ContractState, InMemoryLedger, LedgerConfig};
pub use config::{ChainConfig, ContractConfig, HandshakeConfig, HarnessConfig, SyncOptions};
pub use error::HarnessError;
pub use keystore::{KeyError, Signer};
pub use relay::{ConnectionHandshake, HandshakeState, Proof};
