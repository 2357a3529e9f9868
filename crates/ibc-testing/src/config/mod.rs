// Harness configuration loaded from TOML

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::commitment::DEFAULT_PREFIX;
use crate::error::HarnessError;
use crate::keystore::DEFAULT_HD_PATH;
use crate::types::{Address, Version};

pub const DEFAULT_CLIENT_TYPE: &str = "BesuIBFT2";
pub const DEFAULT_CHANNEL_VERSION: &str = "ics20-1";
pub const DEFAULT_DELAY_PERIOD: u64 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub global: GlobalConfig,
    pub chains: Vec<ChainConfig>,
    #[serde(default)]
    pub handshake: HandshakeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Log level for the harness
    pub log_level: String,
    /// Deadline for a header sync to observe a newer block
    #[serde(default = "default_header_sync_timeout_secs")]
    pub header_sync_timeout_secs: u64,
    /// Delay between header polls in milliseconds
    #[serde(default = "default_header_poll_interval_ms")]
    pub header_poll_interval_ms: u64,
    /// Deadline for a transaction receipt
    #[serde(default = "default_tx_timeout_secs")]
    pub tx_timeout_secs: u64,
}

fn default_header_sync_timeout_secs() -> u64 {
    30
}

fn default_header_poll_interval_ms() -> u64 {
    50
}

fn default_tx_timeout_secs() -> u64 {
    30
}

impl GlobalConfig {
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            timeout: Duration::from_secs(self.header_sync_timeout_secs),
            poll_interval: Duration::from_millis(self.header_poll_interval_ms),
            tx_timeout: Duration::from_secs(self.tx_timeout_secs),
        }
    }
}

/// Timing knobs an agent runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub tx_timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(default_header_sync_timeout_secs()),
            poll_interval: Duration::from_millis(default_header_poll_interval_ms()),
            tx_timeout: Duration::from_secs(default_tx_timeout_secs()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    /// Mnemonic the signing key is derived from
    pub mnemonic: String,
    #[serde(default = "default_hd_path")]
    pub hd_path: String,
    pub contracts: ContractConfig,
}

fn default_hd_path() -> String {
    DEFAULT_HD_PATH.to_string()
}

/// Addresses of the IBC contracts deployed on one chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractConfig {
    pub provable_store_address: Address,
    pub ibc_client_address: Address,
    pub ibc_connection_address: Address,
}

impl ContractConfig {
    pub fn provable_store_address(&self) -> Address {
        self.provable_store_address
    }

    pub fn ibc_client_address(&self) -> Address {
        self.ibc_client_address
    }

    pub fn ibc_connection_address(&self) -> Address {
        self.ibc_connection_address
    }

    /// Deterministic addresses for a test deployment on `chain_id`
    pub fn for_test_chain(chain_id: u64) -> Self {
        let address = |tag: u8| {
            let mut bytes = [0u8; 20];
            bytes[..8].copy_from_slice(&chain_id.to_be_bytes());
            bytes[19] = tag;
            Address(bytes)
        };
        Self {
            provable_store_address: address(1),
            ibc_client_address: address(2),
            ibc_connection_address: address(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeConfig {
    pub client_type: String,
    pub commitment_prefix: String,
    pub delay_period: u64,
    /// Channel version recorded on new test connections
    pub channel_version: String,
    /// Connection versions offered in Init, in preference order
    pub versions: Vec<Version>,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            client_type: DEFAULT_CLIENT_TYPE.to_string(),
            commitment_prefix: DEFAULT_PREFIX.to_string(),
            delay_period: DEFAULT_DELAY_PERIOD,
            channel_version: DEFAULT_CHANNEL_VERSION.to_string(),
            versions: Version::compatibles(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HarnessConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Log level to run with: the command-line override if given, else `global.log_level`
    pub fn effective_log_level<'a>(&'a self, override_level: Option<&'a str>) -> &'a str {
        override_level.unwrap_or(self.global.log_level.as_str())
    }

    /// Get chain configuration by ID
    pub fn get_chain(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.chains.is_empty() {
            return Err(HarnessError::Config("no chains configured".to_string()));
        }
        for (i, chain) in self.chains.iter().enumerate() {
            if chain.mnemonic.trim().is_empty() {
                return Err(HarnessError::Config(format!(
                    "chain {} has an empty mnemonic",
                    chain.chain_id
                )));
            }
            if chain.hd_path.is_empty() {
                return Err(HarnessError::Config(format!(
                    "chain {} has an empty hd_path",
                    chain.chain_id
                )));
            }
            if self.chains[..i].iter().any(|c| c.chain_id == chain.chain_id) {
                return Err(HarnessError::Config(format!(
                    "chain {} configured twice",
                    chain.chain_id
                )));
            }
        }

        let handshake = &self.handshake;
        if handshake.client_type.is_empty() {
            return Err(HarnessError::Config("client_type cannot be empty".to_string()));
        }
        if handshake.commitment_prefix.is_empty() {
            return Err(HarnessError::Config("commitment_prefix cannot be empty".to_string()));
        }
        if handshake.versions.is_empty() {
            return Err(HarnessError::Config("at least one connection version is required".to_string()));
        }
        if self.global.header_poll_interval_ms == 0 || self.global.header_sync_timeout_secs == 0 {
            return Err(HarnessError::Config("header sync timings must be non-zero".to_string()));
        }
        Ok(())
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let mnemonic = "math razor capable expose worth grape metal sunset metal sudden usage scheme";
        let chains = [2018u64, 3018]
            .into_iter()
            .map(|chain_id| ChainConfig {
                chain_id,
                mnemonic: mnemonic.to_string(),
                hd_path: DEFAULT_HD_PATH.to_string(),
                contracts: ContractConfig::for_test_chain(chain_id),
            })
            .collect();

        Self {
            global: GlobalConfig {
                log_level: "info".to_string(),
                header_sync_timeout_secs: default_header_sync_timeout_secs(),
                header_poll_interval_ms: default_header_poll_interval_ms(),
                tx_timeout_secs: default_tx_timeout_secs(),
            },
            chains,
            handshake: HandshakeConfig::default(),
        }
    }
}
