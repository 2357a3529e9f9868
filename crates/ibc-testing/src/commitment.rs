// Commitment paths, storage slots and Merkle inclusion proofs for the provable store

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// 32-byte digest used for slots, commitments and roots
pub type Hash = [u8; 32];

/// Commitment prefix used by every proof in this protocol
pub const DEFAULT_PREFIX: &str = "ibc";

const LEAF_DOMAIN: u8 = 0x00;
const NODE_DOMAIN: u8 = 0x01;

/// Calculate SHA256 hash
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Merkle prefix for commitment proofs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerklePrefix {
    /// The key prefix used for commitment proofs
    pub key_prefix: Vec<u8>,
}

impl MerklePrefix {
    pub fn new(key_prefix: Vec<u8>) -> Self {
        Self { key_prefix }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key_prefix
    }
}

impl Default for MerklePrefix {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_PREFIX.as_bytes().to_vec(),
        }
    }
}

impl From<&str> for MerklePrefix {
    fn from(prefix: &str) -> Self {
        Self::new(prefix.as_bytes().to_vec())
    }
}

pub fn client_state_path(client_id: &str) -> String {
    format!("clients/{}/clientState", client_id)
}

pub fn connection_path(connection_id: &str) -> String {
    format!("connections/{}", connection_id)
}

/// Storage slot holding the commitment for `path` under `prefix`.
///
/// Both chains compute slots the same way, so a chain can derive the slot a
/// counterparty uses for one of its own objects.
pub fn commitment_slot(prefix: &MerklePrefix, path: &str) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(path.as_bytes());
    hasher.finalize().into()
}

/// Render a slot as the `0x`-prefixed hex storage key used by state queries
pub fn slot_to_hex(slot: &Hash) -> String {
    format!("0x{}", hex::encode(slot))
}

/// Which side of the running hash a sibling sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    Left,
    Right,
}

/// One step of a Merkle inclusion path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofNode {
    pub hash: Hash,
    pub position: Position,
}

/// Storage inclusion proof for a single slot.
///
/// `value` is `None` when the slot holds no commitment at the queried height;
/// such a proof never verifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageProof {
    pub key: Hash,
    pub value: Option<Hash>,
    pub proof: Vec<ProofNode>,
}

impl StorageProof {
    pub fn absent(key: Hash) -> Self {
        Self {
            key,
            value: None,
            proof: Vec::new(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Root implied by this proof, if the slot is populated
    pub fn computed_root(&self) -> Option<Hash> {
        self.value
            .map(|value| compute_root_from_path(&leaf_hash(&self.key, &value), &self.proof))
    }

    /// Check that `key` holds `value` under `root`
    pub fn verify(&self, root: &Hash, key: &Hash, value: &Hash) -> bool {
        self.key == *key
            && self.value.as_ref() == Some(value)
            && self.computed_root().as_ref() == Some(root)
    }
}

pub fn leaf_hash(slot: &Hash, value: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_DOMAIN]);
    hasher.update(slot);
    hasher.update(value);
    hasher.finalize().into()
}

fn node_hash(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([NODE_DOMAIN]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|pair| {
            let left = &pair[0];
            // Duplicate last if odd
            let right = pair.get(1).unwrap_or(left);
            node_hash(left, right)
        })
        .collect()
}

/// Build a binary Merkle root over already-hashed leaves
pub fn compute_merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return [0u8; 32];
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

/// Build the sibling path for the leaf at `index`
pub fn build_merkle_proof(leaves: &[Hash], index: usize) -> Option<Vec<ProofNode>> {
    if index >= leaves.len() {
        return None;
    }

    let mut path = Vec::new();
    let mut level = leaves.to_vec();
    let mut index = index;

    while level.len() > 1 {
        let node = if index % 2 == 0 {
            ProofNode {
                hash: *level.get(index + 1).unwrap_or(&level[index]),
                position: Position::Right,
            }
        } else {
            ProofNode {
                hash: level[index - 1],
                position: Position::Left,
            }
        };
        path.push(node);

        level = next_level(&level);
        index /= 2;
    }

    Some(path)
}

pub fn compute_root_from_path(leaf: &Hash, path: &[ProofNode]) -> Hash {
    path.iter().fold(*leaf, |current, node| match node.position {
        Position::Left => node_hash(&node.hash, &current),
        Position::Right => node_hash(&current, &node.hash),
    })
}
