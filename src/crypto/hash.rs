//! Hashing utilities for federation and ledger identifiers
//!
//! Provides SHA-256 (key derivation from seeds) and
//! Keccak-256 (ledger addresses, pending federation hashes, flyover
//! derivation arguments).

use sha2::{Digest, Sha256};
use sha3::Keccak256;

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes Keccak-256 hash of the input data
///
/// This is the original Keccak padding used by the ledger, not NIST SHA3-256.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}
