// Proof store accessor
// Proofs are anchored at the height the verifying chain's client has reached,
// so the verifier always holds a consensus state for the proof height.

use tracing::debug;

use crate::agent::ChainAgent;
use crate::chains::ContractState;
use crate::commitment::{slot_to_hex, Hash};
use crate::error::{HarnessError, Result};

/// Storage proof for one key at one height
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    pub height: u64,
    pub data: Vec<u8>,
}

/// Parse a `0x`-prefixed 32-byte hex storage key
pub fn parse_storage_key(storage_key: &str) -> Result<Hash> {
    let invalid = |reason: &str| HarnessError::InvalidStorageKey {
        key: storage_key.to_string(),
        reason: reason.to_string(),
    };

    let hex_part = storage_key
        .strip_prefix("0x")
        .ok_or_else(|| invalid("storage key must be a 0x-prefixed hex string"))?;
    let bytes = hex::decode(hex_part).map_err(|e| invalid(&e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| invalid("storage key must be 32 bytes"))
}

impl ChainAgent {
    /// State of this chain's provable store at the height `counterparty`'s client has reached
    pub async fn get_contract_state(
        &self,
        counterparty: &ChainAgent,
        counterparty_client_id: &str,
        storage_keys: &[Hash],
    ) -> Result<ContractState> {
        let height = counterparty
            .get_client_state(counterparty_client_id)
            .await?
            .latest_height;

        let state = self
            .backend()
            .get_contract_state(
                &self.contracts().provable_store_address,
                storage_keys,
                Some(height),
            )
            .await?;
        Ok(state)
    }

    /// Prove `storage_key` in this chain's store for verification on `counterparty`
    pub async fn query_proof(
        &self,
        counterparty: &ChainAgent,
        counterparty_client_id: &str,
        storage_key: &str,
    ) -> Result<Proof> {
        let slot = parse_storage_key(storage_key)?;
        let state = self
            .get_contract_state(counterparty, counterparty_client_id, &[slot])
            .await?;
        let height = state.height();

        let proof = match state.storage_proof(0) {
            Some(proof) if proof.value.is_some() => proof,
            _ => {
                return Err(HarnessError::ProofNotFound {
                    key: storage_key.to_string(),
                    chain_id: self.chain_id(),
                    height,
                })
            }
        };

        debug!(
            "📜 Chain {} proved {} at height {}",
            self.chain_id(),
            storage_key,
            height
        );
        Ok(Proof {
            height,
            data: proof.encode()?,
        })
    }

    /// `0x`-hex slot of a client state commitment on this chain
    pub async fn client_state_commitment_slot(&self, client_id: &str) -> Result<String> {
        let slot = self.backend().client_state_commitment_slot(client_id).await?;
        Ok(slot_to_hex(&slot))
    }

    /// `0x`-hex slot of a connection commitment on this chain
    pub async fn connection_state_commitment_slot(&self, connection_id: &str) -> Result<String> {
        let slot = self.backend().connection_commitment_slot(connection_id).await?;
        Ok(slot_to_hex(&slot))
    }
}
