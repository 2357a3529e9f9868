// Provable key/value store whose storage root is carried by every block header

use std::collections::BTreeMap;

use crate::commitment::{
    build_merkle_proof, commitment_slot, compute_merkle_root, leaf_hash, sha256, Hash,
    MerklePrefix, StorageProof,
};

/// Commitments keyed by storage slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvableStore {
    prefix: MerklePrefix,
    commitments: BTreeMap<Hash, Hash>,
}

impl ProvableStore {
    pub fn new(prefix: MerklePrefix) -> Self {
        Self {
            prefix,
            commitments: BTreeMap::new(),
        }
    }

    pub fn prefix(&self) -> &MerklePrefix {
        &self.prefix
    }

    pub fn slot(&self, path: &str) -> Hash {
        commitment_slot(&self.prefix, path)
    }

    /// Commit the hash of `value` at `path`
    pub fn commit(&mut self, path: &str, value: &[u8]) {
        let slot = self.slot(path);
        self.commitments.insert(slot, sha256(value));
    }

    pub fn get(&self, slot: &Hash) -> Option<&Hash> {
        self.commitments.get(slot)
    }

    pub fn len(&self) -> usize {
        self.commitments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commitments.is_empty()
    }

    fn leaves(&self) -> Vec<Hash> {
        self.commitments
            .iter()
            .map(|(slot, value)| leaf_hash(slot, value))
            .collect()
    }

    pub fn storage_root(&self) -> Hash {
        compute_merkle_root(&self.leaves())
    }

    /// Inclusion proof for `slot`, or an empty proof if nothing is committed there
    pub fn prove(&self, slot: &Hash) -> StorageProof {
        let Some(index) = self.commitments.keys().position(|key| key == slot) else {
            return StorageProof::absent(*slot);
        };
        let path = build_merkle_proof(&self.leaves(), index).unwrap_or_default();
        StorageProof {
            key: *slot,
            value: self.commitments.get(slot).copied(),
            proof: path,
        }
    }
}
