// Signing identities for chain agents
// One ed25519 key per chain, derived from a mnemonic and a fixed derivation path

use ed25519_dalek::{Signer as _, SigningKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::chains::SignedTx;
use crate::types::{Address, IbcMsg};

/// Derivation path every agent uses
pub const DEFAULT_HD_PATH: &str = "m/44'/60'/0'/0/0";

/// Errors that can occur during key handling
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Invalid key format: {0}")]
    InvalidFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Transaction signer for one chain
#[derive(Debug, Clone)]
pub struct Signer {
    key: SigningKey,
    address: Address,
}

impl Signer {
    /// Derive the signer for `hd_path` from a mnemonic phrase
    pub fn from_mnemonic(mnemonic: &str, hd_path: &str) -> Result<Self, KeyError> {
        let words: Vec<&str> = mnemonic.split_whitespace().collect();
        if words.len() < 12 {
            return Err(KeyError::InvalidMnemonic(format!(
                "expected at least 12 words, got {}",
                words.len()
            )));
        }
        if !hd_path.starts_with("m/") {
            return Err(KeyError::InvalidFormat(format!("bad derivation path {}", hd_path)));
        }

        let mut hasher = Sha256::new();
        hasher.update(words.join(" ").as_bytes());
        hasher.update(b"\n");
        hasher.update(hd_path.as_bytes());
        let seed: [u8; 32] = hasher.finalize().into();

        Ok(Self::from_signing_key(SigningKey::from_bytes(&seed)))
    }

    /// Create from a hex private key, with or without `0x`
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key.trim_start_matches("0x"))
            .map_err(|e| KeyError::InvalidFormat(format!("Invalid hex key: {}", e)))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidFormat("Private key must be 32 bytes".to_string()))?;
        Ok(Self::from_signing_key(SigningKey::from_bytes(&seed)))
    }

    fn from_signing_key(key: SigningKey) -> Self {
        let address = derive_address(&key.verifying_key().to_bytes());
        Self { key, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }

    /// Sign `msg` for the contract at `to`
    pub fn sign_tx(&self, to: Address, nonce: u64, msg: IbcMsg) -> Result<SignedTx, KeyError> {
        let from = self.public_key();
        let payload = SignedTx::signing_payload(&from, &to, nonce, &msg)
            .map_err(|e| KeyError::Serialization(e.to_string()))?;
        let signature = self.key.sign(&payload).to_bytes().to_vec();

        Ok(SignedTx {
            from,
            to,
            nonce,
            msg,
            signature,
        })
    }
}

/// Last 20 bytes of the public key hash
pub fn derive_address(public_key: &[u8; 32]) -> Address {
    let hash: [u8; 32] = Sha256::digest(public_key).into();
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    Address(address)
}
