//! Federation members
//!
//! A federator holds three keys: one signing peg transactions on Bitcoin,
//! one identifying it on the ledger, and one for multi-signature tooling.

use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

use crate::crypto::{ledger_address, LedgerAddress};

/// Which of a member's keys to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Btc,
    Rsk,
    Mst,
}

/// A single federator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FederationMember {
    btc_public_key: PublicKey,
    rsk_public_key: PublicKey,
    mst_public_key: PublicKey,
}

impl FederationMember {
    pub fn new(btc_public_key: PublicKey, rsk_public_key: PublicKey, mst_public_key: PublicKey) -> Self {
        Self {
            btc_public_key,
            rsk_public_key,
            mst_public_key,
        }
    }

    /// Member using the same key for all three roles, as genesis
    /// federators do
    pub fn from_btc_public_key(key: PublicKey) -> Self {
        Self::new(key, key, key)
    }

    pub fn from_btc_public_keys(keys: &[PublicKey]) -> Vec<Self> {
        keys.iter().copied().map(Self::from_btc_public_key).collect()
    }

    pub fn btc_public_key(&self) -> &PublicKey {
        &self.btc_public_key
    }

    pub fn rsk_public_key(&self) -> &PublicKey {
        &self.rsk_public_key
    }

    pub fn mst_public_key(&self) -> &PublicKey {
        &self.mst_public_key
    }

    pub fn public_key(&self, key_type: KeyType) -> &PublicKey {
        match key_type {
            KeyType::Btc => &self.btc_public_key,
            KeyType::Rsk => &self.rsk_public_key,
            KeyType::Mst => &self.mst_public_key,
        }
    }

    /// Ledger address derived from the member's ledger key
    pub fn rsk_address(&self) -> LedgerAddress {
        ledger_address(&self.rsk_public_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_member_keys() {
        let btc = KeyPair::from_seed("btc").unwrap();
        let rsk = KeyPair::from_seed("rsk").unwrap();
        let mst = KeyPair::from_seed("mst").unwrap();
        let member = FederationMember::new(btc.public_key, rsk.public_key, mst.public_key);

        assert_eq!(member.public_key(KeyType::Btc), &btc.public_key);
        assert_eq!(member.public_key(KeyType::Rsk), &rsk.public_key);
        assert_eq!(member.public_key(KeyType::Mst), &mst.public_key);
        assert_eq!(member.rsk_address(), rsk.ledger_address());
    }

    #[test]
    fn test_members_from_btc_keys_keep_order() {
        let keys: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|seed| KeyPair::from_seed(seed).unwrap().public_key)
            .collect();
        let members = FederationMember::from_btc_public_keys(&keys);

        assert_eq!(members.len(), 3);
        for (member, key) in members.iter().zip(&keys) {
            assert_eq!(member.btc_public_key(), key);
            assert_eq!(member.rsk_public_key(), key);
        }
    }

    #[test]
    fn test_member_serde() {
        let member = FederationMember::from_btc_public_key(KeyPair::from_seed("serde").unwrap().public_key);
        let json = serde_json::to_string(&member).unwrap();
        let decoded: FederationMember = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, member);
    }
}
