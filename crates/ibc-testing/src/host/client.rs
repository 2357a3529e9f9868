// Light client module: client creation, header verification and membership checks

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use super::{ClientRecord, HostError, IbcHost};
use crate::chains::VerifyClientStateRequest;
use crate::commitment::{client_state_path, commitment_slot, sha256, MerklePrefix, StorageProof};
use crate::types::{
    AccountProof, ConsensusState, MsgCreateClient, MsgUpdateClient, ParsedHeader, ValidatorKey,
};

/// Number of seals needed out of `validators`: ceil(2n/3)
pub fn seal_quorum(validators: usize) -> usize {
    (2 * validators + 2) / 3
}

/// Check that at least a quorum of distinct `validators` sealed `header`
pub fn verify_commit_seals(
    header: &ParsedHeader,
    seals: &[Vec<u8>],
    validators: &[ValidatorKey],
) -> Result<(), HostError> {
    if validators.is_empty() {
        return Err(HostError::EmptyValidatorSet);
    }

    let digest = header.seal_hash()?;
    let mut signers: HashSet<ValidatorKey> = HashSet::new();

    for seal in seals {
        let Ok(signature) = Signature::from_slice(seal) else {
            continue;
        };
        let signer = validators.iter().find(|validator| {
            !signers.contains(*validator)
                && VerifyingKey::from_bytes(validator)
                    .map(|key| key.verify(&digest, &signature).is_ok())
                    .unwrap_or(false)
        });
        if let Some(validator) = signer {
            signers.insert(*validator);
        }
    }

    let required = seal_quorum(validators.len());
    if signers.len() < required {
        return Err(HostError::InsufficientSeals {
            signed: signers.len(),
            required,
        });
    }
    Ok(())
}

impl IbcHost {
    pub fn create_client(&mut self, msg: &MsgCreateClient) -> Result<(), HostError> {
        if self.clients.contains_key(&msg.client_id) {
            return Err(HostError::ClientAlreadyExists(msg.client_id.clone()));
        }
        if msg.client_state.chain_id.is_empty() {
            return Err(HostError::InvalidClientState("chain id cannot be empty".to_string()));
        }

        let height = msg.client_state.latest_height;
        let encoded = msg.client_state.encode()?;
        self.store.commit(&client_state_path(&msg.client_id), &encoded);

        let mut consensus_states = BTreeMap::new();
        consensus_states.insert(height, msg.consensus_state.clone());
        self.clients.insert(
            msg.client_id.clone(),
            ClientRecord {
                client_state: msg.client_state.clone(),
                consensus_states,
            },
        );

        debug!("Created client {} at height {}", msg.client_id, height);
        Ok(())
    }

    /// Verify and apply a header update, returning the new latest height
    pub fn update_client(&mut self, msg: &MsgUpdateClient) -> Result<u64, HostError> {
        let (header, consensus_state) = {
            let record = self
                .clients
                .get(&msg.client_id)
                .ok_or_else(|| HostError::ClientNotFound(msg.client_id.clone()))?;

            let header = ParsedHeader::decode(&msg.header.sealing_header)?;
            let trusted = record
                .consensus_states
                .get(&msg.header.trusted_height)
                .ok_or_else(|| HostError::ConsensusStateNotFound {
                    client_id: msg.client_id.clone(),
                    height: msg.header.trusted_height,
                })?;

            if header.number <= record.client_state.latest_height {
                return Err(HostError::HeightNotIncreasing {
                    latest: record.client_state.latest_height,
                    header: header.number,
                });
            }

            verify_commit_seals(&header, &msg.header.seals, &trusted.validators)?;

            let account = AccountProof::decode(&msg.header.account_state_proof)?;
            if account.address != record.client_state.provable_store_address {
                return Err(HostError::AccountProofMismatch(format!(
                    "proof is for {} but client tracks {}",
                    account.address, record.client_state.provable_store_address
                )));
            }
            if account.state_root() != header.root {
                return Err(HostError::AccountProofMismatch(
                    "storage root is not bound to the header state root".to_string(),
                ));
            }

            let consensus_state = ConsensusState {
                timestamp: header.time,
                root: account.storage_root,
                validators: header.validators.clone(),
            };
            (header, consensus_state)
        };

        let record = self
            .clients
            .get_mut(&msg.client_id)
            .ok_or_else(|| HostError::ClientNotFound(msg.client_id.clone()))?;
        record.consensus_states.insert(header.number, consensus_state);
        record.client_state.latest_height = header.number;
        let encoded = record.client_state.encode()?;
        self.store.commit(&client_state_path(&msg.client_id), &encoded);

        debug!("Updated client {} to height {}", msg.client_id, header.number);
        Ok(header.number)
    }

    /// Check that the counterparty store tracked by `client_id` held `value` at `path`
    pub fn verify_membership(
        &self,
        client_id: &str,
        proof_height: u64,
        prefix: &MerklePrefix,
        path: &str,
        value: &[u8],
        proof: &[u8],
    ) -> Result<(), HostError> {
        if proof_height == 0 {
            return Err(HostError::ZeroProofHeight);
        }

        let record = self
            .clients
            .get(client_id)
            .ok_or_else(|| HostError::ClientNotFound(client_id.to_string()))?;
        let consensus_state = record.consensus_states.get(&proof_height).ok_or_else(|| {
            HostError::ConsensusStateNotFound {
                client_id: client_id.to_string(),
                height: proof_height,
            }
        })?;

        let proof =
            StorageProof::decode(proof).map_err(|e| HostError::InvalidProof(e.to_string()))?;
        let slot = commitment_slot(prefix, path);

        if !proof.verify(&consensus_state.root, &slot, &sha256(value)) {
            return Err(HostError::VerificationFailed {
                path: path.to_string(),
                height: proof_height,
            });
        }
        Ok(())
    }

    /// View call: does the counterparty commit `target_client_state` for its client?
    pub fn verify_client_state(&self, request: &VerifyClientStateRequest) -> Result<bool, HostError> {
        let stored = self
            .client_state(&request.client_id)
            .ok_or_else(|| HostError::ClientNotFound(request.client_id.clone()))?;
        if *stored != request.client_state {
            debug!("Client state for {} differs from the caller's copy", request.client_id);
            return Ok(false);
        }

        let target = request.target_client_state.encode()?;
        match self.verify_membership(
            &request.client_id,
            request.proof_height,
            &request.prefix,
            &client_state_path(&request.counterparty_client_id),
            &target,
            &request.proof,
        ) {
            Ok(()) => Ok(true),
            Err(HostError::ClientNotFound(id)) => Err(HostError::ClientNotFound(id)),
            Err(e) => {
                debug!("Client state verification rejected: {}", e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn validators(n: u8) -> Vec<SigningKey> {
        (1..=n).map(|i| SigningKey::from_bytes(&[i; 32])).collect()
    }

    fn header(keys: &[SigningKey]) -> ParsedHeader {
        ParsedHeader {
            number: 5,
            time: 1_700_000_000,
            root: [3u8; 32],
            validators: keys.iter().map(|k| k.verifying_key().to_bytes()).collect(),
        }
    }

    fn seals(header: &ParsedHeader, keys: &[SigningKey]) -> Vec<Vec<u8>> {
        let digest = header.seal_hash().unwrap();
        keys.iter().map(|k| k.sign(&digest).to_bytes().to_vec()).collect()
    }

    #[test]
    fn test_seal_quorum() {
        assert_eq!(seal_quorum(1), 1);
        assert_eq!(seal_quorum(3), 2);
        assert_eq!(seal_quorum(4), 3);
        assert_eq!(seal_quorum(7), 5);
    }

    #[test]
    fn test_quorum_of_seals_accepted() {
        let keys = validators(4);
        let header = header(&keys);
        let trusted: Vec<ValidatorKey> = header.validators.clone();

        assert!(verify_commit_seals(&header, &seals(&header, &keys[..3]), &trusted).is_ok());
    }

    #[test]
    fn test_duplicate_seals_count_once() {
        let keys = validators(4);
        let header = header(&keys);
        let trusted = header.validators.clone();
        let mut duplicated = seals(&header, &keys[..2]);
        duplicated.extend(seals(&header, &keys[..2]));

        assert_eq!(
            verify_commit_seals(&header, &duplicated, &trusted),
            Err(HostError::InsufficientSeals { signed: 2, required: 3 })
        );
    }

    #[test]
    fn test_seals_from_unknown_validators_ignored() {
        let keys = validators(4);
        let outsiders: Vec<SigningKey> = (10..14u8).map(|i| SigningKey::from_bytes(&[i; 32])).collect();
        let header = header(&keys);
        let trusted = header.validators.clone();

        assert!(matches!(
            verify_commit_seals(&header, &seals(&header, &outsiders), &trusted),
            Err(HostError::InsufficientSeals { signed: 0, .. })
        ));
        assert_eq!(
            verify_commit_seals(&header, &[], &[]),
            Err(HostError::EmptyValidatorSet)
        );
    }
}
