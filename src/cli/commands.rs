//! CLI commands for federation diagnostics
//!
//! Implements the command handlers behind the `bridge-federation` binary.

use bitcoin::Network;
use chrono::{DateTime, Utc};
use log::debug;
use secp256k1::PublicKey;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::config::{ActivationConfig, FederationConstants};
use crate::federation::{
    build_federation, select_erp_builder, select_federation_format, Federation, FederationArgs,
    FederationMember,
};
use crate::vote::{AddressBasedAuthorizer, AuthorizerError, QuorumRule};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Network parameters every command runs against
pub struct AppContext {
    pub constants: FederationConstants,
    pub activations: ActivationConfig,
}

impl AppContext {
    /// Load presets for `network`, replacing them with the given files
    pub fn load(
        network: Network,
        constants_file: Option<&Path>,
        activations_file: Option<&Path>,
    ) -> CliResult<Self> {
        let constants = match constants_file {
            Some(path) => FederationConstants::from_json_file(path)?,
            None => FederationConstants::for_network(network)?,
        };
        if constants.network != network {
            return Err(format!(
                "constants are for {}, but {} was requested",
                constants.network, network
            )
            .into());
        }

        let activations = match activations_file {
            Some(path) => ActivationConfig::from_json_file(path)?,
            None => ActivationConfig::for_network(network),
        };

        debug!("Loaded context for {}", network);
        Ok(Self {
            constants,
            activations,
        })
    }

    pub fn network(&self) -> Network {
        self.constants.network
    }
}

/// Federation description accepted by `redeem-script`
#[derive(Debug, Deserialize)]
pub struct FederationFile {
    pub btc_public_keys: Vec<PublicKey>,
    pub creation_block_number: u64,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
}

impl FederationFile {
    pub fn load(path: &Path) -> CliResult<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Build the federation the way the peg would have at its creation height
    pub fn to_federation(&self, context: &AppContext) -> CliResult<Federation> {
        let activations = context.activations.for_block(self.creation_block_number);
        let format = select_federation_format(&activations);
        let args = FederationArgs::new(
            FederationMember::from_btc_public_keys(&self.btc_public_keys),
            self.creation_time
                .unwrap_or(context.constants.genesis_federation_creation_time),
            self.creation_block_number,
            context.network(),
        );
        Ok(build_federation(format, args, &context.constants, &activations)?)
    }
}

/// Print the scripts and address of a federation, the genesis federation
/// when no file is given
pub fn cmd_redeem_script(context: &AppContext, federation_file: Option<&Path>) -> CliResult<()> {
    let federation = match federation_file {
        Some(path) => FederationFile::load(path)?.to_federation(context)?,
        None => context.constants.genesis_federation()?,
    };

    println!("🏛️  {}", federation);
    println!("   ├─ Format version: {}", federation.format_version());
    if let Some(erp) = federation.erp_parameters() {
        println!("   ├─ ERP builder: {}", erp.builder());
        println!(
            "   ├─ Emergency: {} of {} keys after {} blocks",
            erp.emergency_threshold(),
            erp.emergency_public_keys().len(),
            erp.activation_delay()
        );
    }
    println!("   ├─ Created at block: {}", federation.creation_block_number());
    println!("   ├─ Redeem script: {}", hex::encode(federation.redeem_script().as_bytes()));
    println!(
        "   ├─ Standard redeem script: {}",
        hex::encode(federation.standard_redeem_script().as_bytes())
    );
    println!("   ├─ P2SH script: {}", hex::encode(federation.p2sh_script().as_bytes()));
    println!("   └─ Address: {}", federation.address());

    Ok(())
}

/// Print the format and builder a federation created at `height` would get
pub fn cmd_select_builder(context: &AppContext, height: u64) -> CliResult<()> {
    let activations = context.activations.for_block(height);
    let format = select_federation_format(&activations);
    let builder = select_erp_builder(format, context.network(), &activations);

    println!("🔧 Builder selection for {} at block {}", context.network(), height);
    let active: Vec<&str> = activations.active_rules().map(|rule| rule.id()).collect();
    if active.is_empty() {
        println!("   ├─ Active rules: none");
    } else {
        println!("   ├─ Active rules: {}", active.join(", "));
    }
    println!("   ├─ Format version: {}", format);
    match builder {
        Some(builder) => println!("   └─ ERP builder: {}", builder),
        None => println!("   └─ Standard multisig"),
    }

    Ok(())
}

/// Print the votes needed under `rule`, for `identities` voters or the
/// network's federation change authorizers
pub fn cmd_required_votes(
    context: &AppContext,
    rule: QuorumRule,
    identities: Option<usize>,
) -> CliResult<()> {
    let identities = match identities {
        Some(0) => return Err(AuthorizerError::EmptyAuthorizedSet.into()),
        Some(identities) => identities,
        None => AddressBasedAuthorizer::federation_change(&context.constants)?
            .number_of_authorized_identities(),
    };

    println!(
        "🗳️  {} of {} votes required ({})",
        rule.required_votes(identities),
        identities,
        rule
    );
    Ok(())
}
