//! Per-network federation constants
//!
//! Emergency keys, the emergency activation delay, the genesis federation
//! and the addresses allowed to vote on federation changes.

use bitcoin::Network;
use chrono::{DateTime, TimeZone, Utc};
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::ConfigError;
use crate::crypto::{public_keys_from_hex, KeyPair, LedgerAddress};
use crate::federation::{Federation, FederationArgs, FederationError, FederationMember};

/// Emergency recovery keys shared by the mainnet and testnet presets
pub const ERP_FED_PUB_KEYS_HEX: [&str; 3] = [
    "0216c23b2ea8e4f11c3f9e22711addb1d16a93964796913830856b568cc3ea21d3",
    "0275562901dd8faae20de0a4166362a4f82188db77dbed4ca887422ea1ec185f14",
    "034db69f2112f4fb1bb6141bf6e2bd6631f0484d0bd95b16767902c9fe219d4a6f",
];

/// Blocks before the emergency branch of an ERP script becomes spendable
pub const ERP_FED_ACTIVATION_DELAY: u64 = 52_560;

const REGTEST_ERP_FED_ACTIVATION_DELAY: u64 = 500;

/// Mainnet genesis federation keys, in script order
pub const MAINNET_GENESIS_FEDERATION_KEYS_HEX: [&str; 15] = [
    "0245ef34f5ee218005c9c21227133e8568a4f3f11aeab919c66ff7b816ae1ffeea",
    "02481f02b7140acbf3fcdd9f72cf9a7d9484d8125e6df7c9451cfa55ba3b077265",
    "02550cc87fa9061162b1dd395a16662529c9d8094c0feca17905a3244713d65fe8",
    "02566d5ded7c7db1aa7ee4ef6f76989fb42527fcfdcddcd447d6793b7d869e46f7",
    "027319afb15481dbeb3c426bcc37f9a30e7f51ceff586936d85548d9395bcc2344",
    "0294c817150f78607566e961b3c71df53a22022a80acbb982f83c0c8baac040adc",
    "02ac1901b6fba2c1dbd47d894d2bd76c8ba1d296d65f6ab47f1c6b22afb53e73eb",
    "02c6018fcbd3e89f3cf9c7f48b3232ea3638eb8bf217e59ee290f5f0cfb2fb9259",
    "031aabbeb9b27258f98c2bf21f36677ae7bae09eb2d8c958ef41a20a6e88626d26",
    "0340df69f28d69eef60845da7d81ff60a9060d4da35c767f017b0dd4e20448fb44",
    "0355a2e9bf100c00fc0a214afd1bf272647c7824eb9cb055480962f0c382596a70",
    "0372cd46831f3b6afd4c044d160b7667e8ebf659d6cb51a825a3104df6ee0638c6",
    "03b53899c390573471ba30e5054f78376c5f797fda26dde7a760789f02908cbad2",
    "03b65694ccccda83cbb1e56b31308acd08e993114c33f66a456b627c2c1c68bed6",
    "03f909ae15558c70cc751aff9b1f495199c325b13a9e5b934fd6299cd30ec50be8",
];

/// Testnet genesis federation keys, in script order
pub const TESTNET_GENESIS_FEDERATION_KEYS_HEX: [&str; 5] = [
    "0208f40073a9e43b3e9103acec79767a6de9b0409749884e989960fee578012fce",
    "0225e892391625854128c5c4ea4340de0c2a70570f33db53426fc9c746597a03f4",
    "02afc230c2d355b1a577682b07bc2646041b5d0177af0f98395a46018da699b6da",
    "0344a3c38cd59afcba3edcebe143e025574594b001700dec41e59409bdbd0f2a09",
    "039a060badbeb24bee49eb2063f616c0f0f0765d4ca646b20a88ce828f259fcdb9",
];

const GENESIS_FEDERATION_CREATION_TIMESTAMP: i64 = 1_514_948_400;

/// Seeds for the regtest federators and change authorizers
const REGTEST_FEDERATOR_SEEDS: [&str; 3] = ["federator1", "federator2", "federator3"];
const REGTEST_ERP_SEEDS: [&str; 3] = ["erp-fed-01", "erp-fed-02", "erp-fed-03"];
const REGTEST_AUTHORIZER_SEEDS: [&str; 3] = ["auth-a", "auth-b", "auth-c"];

/// Federation parameters fixed per network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationConstants {
    pub network: Network,
    pub erp_fed_pub_keys: Vec<PublicKey>,
    pub erp_fed_activation_delay: u64,
    pub genesis_federation_pub_keys: Vec<PublicKey>,
    pub genesis_federation_creation_time: DateTime<Utc>,
    /// Ledger accounts allowed to vote on federation changes
    #[serde(default)]
    pub federation_change_authorizers: Vec<LedgerAddress>,
}

impl FederationConstants {
    pub fn mainnet() -> Result<Self, ConfigError> {
        Ok(Self {
            network: Network::Bitcoin,
            erp_fed_pub_keys: public_keys_from_hex(&ERP_FED_PUB_KEYS_HEX)?,
            erp_fed_activation_delay: ERP_FED_ACTIVATION_DELAY,
            genesis_federation_pub_keys: public_keys_from_hex(&MAINNET_GENESIS_FEDERATION_KEYS_HEX)?,
            genesis_federation_creation_time: genesis_creation_time()?,
            federation_change_authorizers: Vec::new(),
        })
    }

    pub fn testnet() -> Result<Self, ConfigError> {
        Ok(Self {
            network: Network::Testnet,
            erp_fed_pub_keys: public_keys_from_hex(&ERP_FED_PUB_KEYS_HEX)?,
            erp_fed_activation_delay: ERP_FED_ACTIVATION_DELAY,
            genesis_federation_pub_keys: public_keys_from_hex(&TESTNET_GENESIS_FEDERATION_KEYS_HEX)?,
            genesis_federation_creation_time: genesis_creation_time()?,
            federation_change_authorizers: Vec::new(),
        })
    }

    /// Regtest constants derived from well-known seeds
    pub fn regtest() -> Result<Self, ConfigError> {
        let keys_from_seeds = |seeds: &[&str]| -> Result<Vec<KeyPair>, ConfigError> {
            seeds
                .iter()
                .map(|seed| KeyPair::from_seed(seed).map_err(ConfigError::from))
                .collect()
        };

        Ok(Self {
            network: Network::Regtest,
            erp_fed_pub_keys: keys_from_seeds(&REGTEST_ERP_SEEDS)?
                .iter()
                .map(|kp| kp.public_key)
                .collect(),
            erp_fed_activation_delay: REGTEST_ERP_FED_ACTIVATION_DELAY,
            genesis_federation_pub_keys: keys_from_seeds(&REGTEST_FEDERATOR_SEEDS)?
                .iter()
                .map(|kp| kp.public_key)
                .collect(),
            genesis_federation_creation_time: genesis_creation_time()?,
            federation_change_authorizers: keys_from_seeds(&REGTEST_AUTHORIZER_SEEDS)?
                .iter()
                .map(KeyPair::ledger_address)
                .collect(),
        })
    }

    /// Preset constants for a network
    pub fn for_network(network: Network) -> Result<Self, ConfigError> {
        match network {
            Network::Bitcoin => Self::mainnet(),
            Network::Testnet => Self::testnet(),
            Network::Regtest => Self::regtest(),
            other => Err(ConfigError::Invalid(format!(
                "no federation constants for network {}",
                other
            ))),
        }
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let constants: Self = serde_json::from_str(&contents)?;
        constants.validate()?;
        Ok(constants)
    }

    /// Check the invariants federations rely on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.erp_fed_pub_keys.is_empty() {
            return Err(ConfigError::Invalid("erp_fed_pub_keys is empty".to_string()));
        }
        if self.genesis_federation_pub_keys.is_empty() {
            return Err(ConfigError::Invalid(
                "genesis_federation_pub_keys is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The standard multisig federation the peg starts with
    pub fn genesis_federation(&self) -> Result<Federation, FederationError> {
        let args = FederationArgs::new(
            FederationMember::from_btc_public_keys(&self.genesis_federation_pub_keys),
            self.genesis_federation_creation_time,
            0,
            self.network,
        );
        Federation::standard_multisig(args)
    }
}

fn genesis_creation_time() -> Result<DateTime<Utc>, ConfigError> {
    Utc.timestamp_opt(GENESIS_FEDERATION_CREATION_TIMESTAMP, 0)
        .single()
        .ok_or_else(|| ConfigError::Invalid("invalid genesis creation time".to_string()))
}
