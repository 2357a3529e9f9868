// IBC data types shared by the agents and the in-memory host

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub mod client;
pub mod connection;
pub mod header;
pub mod msgs;
pub mod version;

pub use client::{ClientHeader, ClientState, ConsensusState, ValidatorKey};
pub use connection::{ConnectionEnd, Counterparty, State};
pub use header::{AccountProof, ParsedHeader};
pub use msgs::{
    IbcMsg, MsgConnectionOpenAck, MsgConnectionOpenConfirm, MsgConnectionOpenInit,
    MsgConnectionOpenTry, MsgCreateClient, MsgUpdateClient,
};
pub use version::{Version, VersionError};

/// 20-byte contract/account address, rendered as `0x`-prefixed hex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| format!("address must be 0x-prefixed: {}", s))?;
        let bytes = hex::decode(digits).map_err(|e| format!("invalid address {}: {}", s, e))?;
        let array: [u8; 20] = bytes
            .try_into()
            .map_err(|_| format!("address must be 20 bytes: {}", s))?;
        Ok(Address(array))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_round_trips_through_hex() {
        let address: Address = "0x00000000000000000000000000000000000000ff".parse().unwrap();
        assert_eq!(address.0[19], 0xff);
        assert_eq!(address.to_string(), "0x00000000000000000000000000000000000000ff");
    }

    #[test]
    fn test_address_rejects_bad_input() {
        assert!("00000000000000000000000000000000000000ff".parse::<Address>().is_err());
        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzz00000000000000000000000000000000000000".parse::<Address>().is_err());
    }
}
