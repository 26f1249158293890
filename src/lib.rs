//! Bridge federation: redeem scripts and authorization for a Bitcoin peg
//!
//! This crate provides the federation core of a two-way peg:
//! - Redeem script builders, including frozen historical variants
//! - Builder selection by network and consensus rule activations
//! - Standard multisig and emergency recovery (ERP) federations
//! - Wallet resolution of federation and flyover script hashes
//! - Quorum-gated authorization of administrative votes
//! - JSON persistence of federation state
//!
//! # Example
//!
//! ```rust
//! use bridge_federation::config::{ActivationConfig, FederationConstants};
//! use bridge_federation::federation::FederationFormatVersion;
//! use bridge_federation::wallet::FederationWallet;
//! use std::sync::Arc;
//!
//! // Mainnet genesis federation
//! let constants = FederationConstants::mainnet().unwrap();
//! let genesis = constants.genesis_federation().unwrap();
//! assert_eq!(genesis.format_version(), FederationFormatVersion::StandardMultisig);
//! println!("{}", genesis);
//!
//! // Resolve its script hash back to signing material
//! let script_hash = genesis.redeem_script_hash();
//! let wallet = FederationWallet::new(vec![Arc::new(genesis)]);
//! let redeem_data = wallet.find_redeem_data_from_script_hash(&script_hash).unwrap();
//! assert!(redeem_data.is_some());
//!
//! // Builder selection follows activations
//! let activations = ActivationConfig::mainnet().for_block(6_000_000);
//! let format = bridge_federation::federation::select_federation_format(&activations);
//! assert_eq!(format, FederationFormatVersion::P2shErp);
//! ```

pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod federation;
pub mod script;
pub mod storage;
pub mod vote;
pub mod wallet;

// Re-export commonly used types
pub use config::{ActivationConfig, ActivationSource, ConsensusRule, FederationConstants};
pub use crypto::{KeyPair, LedgerAddress};
pub use error::ErrorReason;
pub use federation::{
    ErpBuilderKind, Federation, FederationError, FederationFormatVersion, FederationKind,
    FederationMember, PendingFederation,
};
pub use script::{DerivationArgumentsHash, ErpRedeemScriptBuilder, RedeemScriptError};
pub use storage::{FederationStorageProvider, InMemoryStorage, JsonFileStorage, StorageAccessor};
pub use vote::{AddressBasedAuthorizer, AuthorizerError, QuorumRule};
pub use wallet::{DerivationSource, FederationWallet, RedeemData, ResolutionError};
