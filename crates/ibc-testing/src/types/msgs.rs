// Messages submitted to the light client and connection contracts

use serde::{Deserialize, Serialize};

use super::client::{ClientHeader, ClientState, ConsensusState};
use super::connection::Counterparty;
use super::version::Version;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreateClient {
    pub client_id: String,
    pub client_state: ClientState,
    pub consensus_state: ConsensusState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateClient {
    pub client_id: String,
    pub header: ClientHeader,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgConnectionOpenInit {
    pub client_id: String,
    pub connection_id: String,
    pub counterparty: Counterparty,
    /// Versions offered to the counterparty, each checked against the host
    pub versions: Vec<Version>,
    pub delay_period: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgConnectionOpenTry {
    pub connection_id: String,
    pub counterparty: Counterparty,
    pub delay_period: u64,
    pub client_id: String,
    /// Versions the counterparty offered in its Init
    pub counterparty_versions: Vec<Version>,
    pub proof_height: u64,
    pub proof_init: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgConnectionOpenAck {
    pub connection_id: String,
    pub counterparty_connection_id: String,
    pub version: Version,
    pub proof_height: u64,
    pub proof_try: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgConnectionOpenConfirm {
    pub connection_id: String,
    pub proof_height: u64,
    pub proof_ack: Vec<u8>,
}

/// Every state-changing call an agent can submit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IbcMsg {
    CreateClient(MsgCreateClient),
    UpdateClient(MsgUpdateClient),
    ConnectionOpenInit(MsgConnectionOpenInit),
    ConnectionOpenTry(MsgConnectionOpenTry),
    ConnectionOpenAck(MsgConnectionOpenAck),
    ConnectionOpenConfirm(MsgConnectionOpenConfirm),
}

impl IbcMsg {
    pub fn name(&self) -> &'static str {
        match self {
            IbcMsg::CreateClient(_) => "CreateClient",
            IbcMsg::UpdateClient(_) => "UpdateClient",
            IbcMsg::ConnectionOpenInit(_) => "ConnectionOpenInit",
            IbcMsg::ConnectionOpenTry(_) => "ConnectionOpenTry",
            IbcMsg::ConnectionOpenAck(_) => "ConnectionOpenAck",
            IbcMsg::ConnectionOpenConfirm(_) => "ConnectionOpenConfirm",
        }
    }

    /// Whether the message targets the light client contract rather than the connection contract
    pub fn is_client_msg(&self) -> bool {
        matches!(self, IbcMsg::CreateClient(_) | IbcMsg::UpdateClient(_))
    }
}
