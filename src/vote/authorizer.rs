//! Quorum-gated authorization
//!
//! Answers whether an identity may vote on an administrative change and how
//! many votes the change needs. Tallying happens elsewhere.

use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use crate::config::FederationConstants;
use crate::crypto::{ledger_address, LedgerAddress};
use crate::error::ErrorReason;

/// Authorizer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizerError {
    #[error("Authorizer needs at least one authorized identity")]
    EmptyAuthorizedSet,
}

impl AuthorizerError {
    pub fn reason(&self) -> ErrorReason {
        match self {
            AuthorizerError::EmptyAuthorizedSet => ErrorReason::EmptyAuthorizedSet,
        }
    }
}

/// How many of the authorized identities must agree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuorumRule {
    One,
    Majority,
    All,
}

impl QuorumRule {
    /// Votes needed out of `identities`
    pub fn required_votes(&self, identities: usize) -> usize {
        match self {
            QuorumRule::One => 1,
            QuorumRule::Majority => identities / 2 + 1,
            QuorumRule::All => identities,
        }
    }
}

impl fmt::Display for QuorumRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuorumRule::One => write!(f, "one"),
            QuorumRule::Majority => write!(f, "majority"),
            QuorumRule::All => write!(f, "all"),
        }
    }
}

/// Fixed, non-empty set of ledger addresses empowered to vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AuthorizerRecord")]
pub struct AddressBasedAuthorizer {
    authorized: BTreeSet<LedgerAddress>,
    rule: QuorumRule,
}

#[derive(Deserialize)]
struct AuthorizerRecord {
    authorized: BTreeSet<LedgerAddress>,
    rule: QuorumRule,
}

impl TryFrom<AuthorizerRecord> for AddressBasedAuthorizer {
    type Error = AuthorizerError;

    fn try_from(record: AuthorizerRecord) -> Result<Self, Self::Error> {
        Self::new(record.authorized, record.rule)
    }
}

impl AddressBasedAuthorizer {
    pub fn new(
        authorized: impl IntoIterator<Item = LedgerAddress>,
        rule: QuorumRule,
    ) -> Result<Self, AuthorizerError> {
        let authorized: BTreeSet<_> = authorized.into_iter().collect();
        if authorized.is_empty() {
            return Err(AuthorizerError::EmptyAuthorizedSet);
        }
        Ok(Self { authorized, rule })
    }

    /// Authorizer over the ledger addresses of the given keys
    pub fn from_keys(keys: &[PublicKey], rule: QuorumRule) -> Result<Self, AuthorizerError> {
        Self::new(keys.iter().map(ledger_address), rule)
    }

    /// Majority of the network's federation change authorizers
    ///
    /// The mainnet and testnet presets carry no authorizers, so this fails
    /// unless they come from a constants file.
    pub fn federation_change(constants: &FederationConstants) -> Result<Self, AuthorizerError> {
        Self::new(
            constants.federation_change_authorizers.iter().copied(),
            QuorumRule::Majority,
        )
    }

    pub fn is_authorized(&self, address: &LedgerAddress) -> bool {
        self.authorized.contains(address)
    }

    pub fn is_authorized_key(&self, key: &PublicKey) -> bool {
        self.is_authorized(&ledger_address(key))
    }

    pub fn required_votes(&self) -> usize {
        self.rule.required_votes(self.authorized.len())
    }

    pub fn number_of_authorized_identities(&self) -> usize {
        self.authorized.len()
    }

    pub fn rule(&self) -> QuorumRule {
        self.rule
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn keys(count: usize) -> Vec<PublicKey> {
        (0..count)
            .map(|i| KeyPair::from_seed(&format!("voter{}", i)).unwrap().public_key)
            .collect()
    }

    #[test]
    fn test_required_votes_for_seven() {
        let keys = keys(7);
        let votes = |rule| AddressBasedAuthorizer::from_keys(&keys, rule).unwrap().required_votes();

        assert_eq!(votes(QuorumRule::Majority), 4);
        assert_eq!(votes(QuorumRule::One), 1);
        assert_eq!(votes(QuorumRule::All), 7);
    }

    #[test]
    fn test_majority_of_even_set() {
        assert_eq!(QuorumRule::Majority.required_votes(4), 3);
        assert_eq!(QuorumRule::Majority.required_votes(1), 1);
    }

    #[test]
    fn test_is_authorized() {
        let keys = keys(3);
        let authorizer = AddressBasedAuthorizer::from_keys(&keys, QuorumRule::Majority).unwrap();
        let outsider = KeyPair::from_seed("outsider").unwrap();

        assert!(authorizer.is_authorized_key(&keys[1]));
        assert!(authorizer.is_authorized(&ledger_address(&keys[2])));
        assert!(!authorizer.is_authorized_key(&outsider.public_key));
        assert!(!authorizer.is_authorized(&outsider.ledger_address()));
    }

    #[test]
    fn test_duplicate_identities_count_once() {
        let key = keys(1)[0];
        let authorizer = AddressBasedAuthorizer::from_keys(&[key, key], QuorumRule::All).unwrap();
        assert_eq!(authorizer.number_of_authorized_identities(), 1);
        assert_eq!(authorizer.required_votes(), 1);
    }

    #[test]
    fn test_regtest_federation_change_authorizer() {
        let constants = FederationConstants::regtest().unwrap();
        let authorizer = AddressBasedAuthorizer::federation_change(&constants).unwrap();

        assert_eq!(authorizer.number_of_authorized_identities(), 3);
        assert_eq!(authorizer.required_votes(), 2);
        assert!(authorizer.is_authorized_key(&KeyPair::from_seed("auth-b").unwrap().public_key));
    }

    #[test]
    fn test_empty_authorized_set_is_rejected() {
        for rule in [QuorumRule::One, QuorumRule::Majority, QuorumRule::All] {
            let error = AddressBasedAuthorizer::from_keys(&[], rule).unwrap_err();
            assert_eq!(error, AuthorizerError::EmptyAuthorizedSet);
            assert_eq!(error.reason(), ErrorReason::EmptyAuthorizedSet);
        }

        let mainnet = FederationConstants::mainnet().unwrap();
        assert_eq!(
            AddressBasedAuthorizer::federation_change(&mainnet).unwrap_err(),
            AuthorizerError::EmptyAuthorizedSet
        );
    }

    #[test]
    fn test_serde_rejects_empty_authorized_set() {
        let authorizer = AddressBasedAuthorizer::from_keys(&keys(2), QuorumRule::All).unwrap();
        let json = serde_json::to_string(&authorizer).unwrap();
        assert_eq!(
            serde_json::from_str::<AddressBasedAuthorizer>(&json).unwrap(),
            authorizer
        );

        let empty = r#"{"authorized":[],"rule":"majority"}"#;
        assert!(serde_json::from_str::<AddressBasedAuthorizer>(empty).is_err());
    }
}
