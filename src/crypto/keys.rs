//! Key handling for federation members and authorized voters
//!
//! Federation keys live on the secp256k1 curve (same as Bitcoin). The same
//! key material identifies a ledger account through a Keccak-derived address.

use secp256k1::{PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::hash::{keccak256, sha256};

/// Length of a ledger account address in bytes
pub const LEDGER_ADDRESS_LENGTH: usize = 20;

/// Errors that can occur during key operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A ledger-side account address (last 20 bytes of the Keccak-256 of the
/// uncompressed public key, without its prefix byte)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerAddress(#[serde(with = "hex::serde")] [u8; LEDGER_ADDRESS_LENGTH]);

impl LedgerAddress {
    pub fn new(bytes: [u8; LEDGER_ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse an address from a hex string, with or without `0x` prefix
    pub fn from_hex(value: &str) -> Result<Self, KeyError> {
        let trimmed = value.strip_prefix("0x").unwrap_or(value);
        let bytes = hex::decode(trimmed).map_err(|e| KeyError::InvalidAddress(e.to_string()))?;
        let bytes: [u8; LEDGER_ADDRESS_LENGTH] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidAddress(format!("expected 20 bytes: {}", value)))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; LEDGER_ADDRESS_LENGTH] {
        &self.0
    }
}

impl fmt::Display for LedgerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key = SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Deterministically derive a key pair from a seed string
    ///
    /// The secret key is SHA-256(seed). Used for fixtures and regtest setups.
    pub fn from_seed(seed: &str) -> Result<Self, KeyError> {
        let secret_key = SecretKey::from_slice(&sha256(seed.as_bytes()))?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Ledger address controlled by this key pair
    pub fn ledger_address(&self) -> LedgerAddress {
        ledger_address(&self.public_key)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Derive the ledger address of a public key
pub fn ledger_address(public_key: &PublicKey) -> LedgerAddress {
    let uncompressed = public_key.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    let mut address = [0u8; LEDGER_ADDRESS_LENGTH];
    address.copy_from_slice(&hash[32 - LEDGER_ADDRESS_LENGTH..]);
    LedgerAddress(address)
}

/// Parse a public key from hex string (compressed or uncompressed)
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(hex_key).map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;
    PublicKey::from_slice(&bytes).map_err(|e| KeyError::InvalidPublicKey(e.to_string()))
}

/// Parse a list of hex public keys, failing on the first invalid one
pub fn public_keys_from_hex<S: AsRef<str>>(hex_keys: &[S]) -> Result<Vec<PublicKey>, KeyError> {
    hex_keys
        .iter()
        .map(|key| public_key_from_hex(key.as_ref()))
        .collect()
}
