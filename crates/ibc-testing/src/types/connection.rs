use serde::{Deserialize, Serialize};
use std::fmt;

use super::version::Version;
use crate::commitment::{sha256, Hash, MerklePrefix};

/// Connection state enumeration following ICS-03
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    Init,
    TryOpen,
    Open,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Init => "INIT",
            State::TryOpen => "TRYOPEN",
            State::Open => "OPEN",
        };
        f.write_str(name)
    }
}

/// Counterparty connection information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterparty {
    /// Client ID on the counterparty chain
    pub client_id: String,
    /// Connection ID on the counterparty chain, unknown until Try
    pub connection_id: Option<String>,
    /// Commitment prefix used by the counterparty chain
    pub prefix: MerklePrefix,
}

impl Counterparty {
    pub fn new(client_id: String, connection_id: Option<String>, prefix: MerklePrefix) -> Self {
        Self {
            client_id,
            connection_id,
            prefix,
        }
    }
}

/// Connection end as stored (and committed) by one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEnd {
    pub state: State,
    pub client_id: String,
    pub counterparty: Counterparty,
    /// Supported versions while INIT, the negotiated one afterwards
    pub versions: Vec<Version>,
    pub delay_period: u64,
}

impl ConnectionEnd {
    pub fn new(
        state: State,
        client_id: String,
        counterparty: Counterparty,
        versions: Vec<Version>,
        delay_period: u64,
    ) -> Self {
        Self {
            state,
            client_id,
            counterparty,
            versions,
            delay_period,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }

    pub fn counterparty_connection_id(&self) -> Option<&str> {
        self.counterparty.connection_id.as_deref()
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn commitment(&self) -> Result<Hash, serde_json::Error> {
        Ok(sha256(&self.encode()?))
    }
}
