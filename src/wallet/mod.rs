//! Federation wallet
//!
//! Resolves watched script hashes to the redeem data that spends them,
//! including flyover scripts derived from a federation.

pub mod derivation;
pub mod resolver;

pub use derivation::{
    flyover_redeem_script, DerivationRecord, DerivationSource, InMemoryDerivations,
    NoDerivations, SingleDerivation, StorageDerivations,
};
pub use resolver::{FederationWallet, RedeemData, ResolutionError};

pub use crate::script::DerivationArgumentsHash;
