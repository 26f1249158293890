//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256 and Keccak-256 hashing
//! - secp256k1 key handling and ledger address derivation

pub mod hash;
pub mod keys;

pub use hash::{keccak256, sha256};
pub use keys::{
    ledger_address, public_key_from_hex, public_keys_from_hex, KeyError, KeyPair, LedgerAddress,
    LEDGER_ADDRESS_LENGTH,
};
