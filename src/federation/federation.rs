//! Federation entity
//!
//! A federation is an ordered set of members controlling a P2SH address.
//! Standard multisig federations sign with a majority of their keys; ERP
//! federations add an emergency branch spendable by a separate key set once
//! a relative timelock expires.

use bitcoin::script::ScriptBuf;
use bitcoin::{Address, Network, ScriptHash};
use chrono::{DateTime, Utc};
use log::debug;
use secp256k1::PublicKey;
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

use super::factory::{ErpBuilderKind, FederationFormatVersion};
use super::member::FederationMember;
use crate::crypto::LedgerAddress;
use crate::error::ErrorReason;
use crate::script::{
    create_multisig_redeem_script, extract_standard_redeem_script, majority_threshold,
    validate_timelock, ErpRedeemScriptBuilder, RedeemScriptError,
};

/// Minimum number of members a federation can be committed with
pub const MIN_FEDERATION_SIZE: usize = 2;

// =============================================================================
// Errors
// =============================================================================

/// Federation construction and decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FederationError {
    #[error("Federation must have at least one member")]
    EmptyMembers,
    #[error("Duplicate federation member with BTC key {0}")]
    DuplicateMember(PublicKey),
    #[error("Federation needs at least {min} members, got {0}", min = MIN_FEDERATION_SIZE)]
    IncompleteFederation(usize),
    #[error("Unknown federation format version: {0}")]
    UnknownFederationFormatVersion(u32),
    #[error("Redeem script error: {0}")]
    RedeemScript(#[from] RedeemScriptError),
}

impl FederationError {
    pub fn reason(&self) -> ErrorReason {
        match self {
            FederationError::EmptyMembers => ErrorReason::EmptyMembers,
            FederationError::DuplicateMember(_) => ErrorReason::DuplicateMember,
            FederationError::IncompleteFederation(_) => ErrorReason::IncompleteFederation,
            FederationError::UnknownFederationFormatVersion(_) => {
                ErrorReason::UnknownFederationFormatVersion
            }
            FederationError::RedeemScript(e) => e.reason(),
        }
    }
}

// =============================================================================
// Construction inputs
// =============================================================================

/// Fields shared by every federation kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederationArgs {
    pub members: Vec<FederationMember>,
    pub creation_time: DateTime<Utc>,
    pub creation_block_number: u64,
    pub network: Network,
}

impl FederationArgs {
    pub fn new(
        members: Vec<FederationMember>,
        creation_time: DateTime<Utc>,
        creation_block_number: u64,
        network: Network,
    ) -> Self {
        Self {
            members,
            creation_time,
            creation_block_number,
            network,
        }
    }
}

/// Emergency recovery parameters of an ERP federation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErpParameters {
    emergency_public_keys: Vec<PublicKey>,
    activation_delay: u64,
    builder: ErpBuilderKind,
}

impl ErpParameters {
    pub fn new(
        emergency_public_keys: Vec<PublicKey>,
        activation_delay: u64,
        builder: ErpBuilderKind,
    ) -> Result<Self, FederationError> {
        if emergency_public_keys.is_empty() {
            return Err(RedeemScriptError::EmptyEmergencyKeySet.into());
        }
        validate_timelock(activation_delay)?;
        Ok(Self {
            emergency_public_keys,
            activation_delay,
            builder,
        })
    }

    pub fn emergency_public_keys(&self) -> &[PublicKey] {
        &self.emergency_public_keys
    }

    pub fn activation_delay(&self) -> u64 {
        self.activation_delay
    }

    pub fn builder(&self) -> ErpBuilderKind {
        self.builder
    }

    pub fn emergency_threshold(&self) -> usize {
        majority_threshold(self.emergency_public_keys.len())
    }
}

/// What kind of redeem script a federation owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FederationKind {
    StandardMultisig,
    Erp(ErpParameters),
}

// =============================================================================
// Federation
// =============================================================================

/// An immutable federation
///
/// The redeem script is built and validated on construction. Derived
/// scripts are computed on first use and cached, so a `Federation` can be
/// shared across threads behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Federation {
    members: Vec<FederationMember>,
    creation_time: DateTime<Utc>,
    creation_block_number: u64,
    network: Network,
    kind: FederationKind,
    redeem_script: ScriptBuf,
    standard_redeem_script: ScriptBuf,
    address: Address,
    p2sh_script: OnceLock<ScriptBuf>,
}

impl Federation {
    /// Create a federation signing with a majority of its members' BTC keys
    pub fn standard_multisig(args: FederationArgs) -> Result<Self, FederationError> {
        validate_members(&args.members)?;
        let keys = btc_public_keys(&args.members);
        let redeem_script = create_multisig_redeem_script(&keys, majority_threshold(keys.len()))?;

        debug!(
            "Created standard multisig federation with {} members at block {}",
            keys.len(),
            args.creation_block_number
        );
        Self::assemble(args, FederationKind::StandardMultisig, redeem_script.clone(), redeem_script)
    }

    /// Create a federation with an emergency recovery branch
    pub fn erp(args: FederationArgs, erp: ErpParameters) -> Result<Self, FederationError> {
        validate_members(&args.members)?;
        let keys = btc_public_keys(&args.members);
        let redeem_script = erp.builder.create_redeem_script(
            &keys,
            majority_threshold(keys.len()),
            &erp.emergency_public_keys,
            erp.emergency_threshold(),
            erp.activation_delay,
        )?;
        let standard_redeem_script = extract_standard_redeem_script(&redeem_script)?;

        debug!(
            "Created {} ERP federation with {} members at block {}",
            erp.builder,
            keys.len(),
            args.creation_block_number
        );
        Self::assemble(args, FederationKind::Erp(erp), redeem_script, standard_redeem_script)
    }

    fn assemble(
        args: FederationArgs,
        kind: FederationKind,
        redeem_script: ScriptBuf,
        standard_redeem_script: ScriptBuf,
    ) -> Result<Self, FederationError> {
        let address = Address::p2sh(&redeem_script, args.network)
            .map_err(|e| RedeemScriptError::malformed(e.to_string()))?;
        Ok(Self {
            members: args.members,
            creation_time: args.creation_time,
            creation_block_number: args.creation_block_number,
            network: args.network,
            kind,
            redeem_script,
            standard_redeem_script,
            address,
            p2sh_script: OnceLock::new(),
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn members(&self) -> &[FederationMember] {
        &self.members
    }

    pub fn btc_public_keys(&self) -> Vec<PublicKey> {
        btc_public_keys(&self.members)
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Signatures needed to spend through the default branch
    pub fn number_of_signatures_required(&self) -> usize {
        majority_threshold(self.members.len())
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    pub fn creation_block_number(&self) -> u64 {
        self.creation_block_number
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn kind(&self) -> &FederationKind {
        &self.kind
    }

    pub fn format_version(&self) -> FederationFormatVersion {
        match &self.kind {
            FederationKind::StandardMultisig => FederationFormatVersion::StandardMultisig,
            FederationKind::Erp(erp) => erp.builder.format_version(),
        }
    }

    pub fn erp_parameters(&self) -> Option<&ErpParameters> {
        match &self.kind {
            FederationKind::StandardMultisig => None,
            FederationKind::Erp(erp) => Some(erp),
        }
    }

    pub fn emergency_public_keys(&self) -> Option<&[PublicKey]> {
        self.erp_parameters().map(ErpParameters::emergency_public_keys)
    }

    pub fn activation_delay(&self) -> Option<u64> {
        self.erp_parameters().map(ErpParameters::activation_delay)
    }

    /// The full redeem script, including any emergency branch
    pub fn redeem_script(&self) -> &ScriptBuf {
        &self.redeem_script
    }

    /// The plain multisig used in normal operation
    pub fn standard_redeem_script(&self) -> &ScriptBuf {
        &self.standard_redeem_script
    }

    /// Hash160 of the redeem script
    pub fn redeem_script_hash(&self) -> ScriptHash {
        self.redeem_script.script_hash()
    }

    /// `OP_HASH160 <hash> OP_EQUAL` output script locking funds to the
    /// federation
    pub fn p2sh_script(&self) -> &ScriptBuf {
        self.p2sh_script
            .get_or_init(|| ScriptBuf::new_p2sh(&self.redeem_script.script_hash()))
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    // -------------------------------------------------------------------------
    // Member queries
    // -------------------------------------------------------------------------

    pub fn btc_public_key_index(&self, key: &PublicKey) -> Option<usize> {
        self.members
            .iter()
            .position(|member| member.btc_public_key() == key)
    }

    pub fn has_btc_public_key(&self, key: &PublicKey) -> bool {
        self.btc_public_key_index(key).is_some()
    }

    pub fn has_member_with_rsk_address(&self, address: &LedgerAddress) -> bool {
        self.members
            .iter()
            .any(|member| &member.rsk_address() == address)
    }

    pub fn is_member(&self, member: &FederationMember) -> bool {
        self.members.contains(member)
    }

    pub fn member_by_btc_public_key(&self, key: &PublicKey) -> Option<&FederationMember> {
        self.members
            .iter()
            .find(|member| member.btc_public_key() == key)
    }
}

impl PartialEq for Federation {
    fn eq(&self, other: &Self) -> bool {
        self.number_of_signatures_required() == other.number_of_signatures_required()
            && self.members.len() == other.members.len()
            && self.creation_time == other.creation_time
            && self.creation_block_number == other.creation_block_number
            && self.network == other.network
            && self.members == other.members
            && self.redeem_script == other.redeem_script
            && self.emergency_public_keys() == other.emergency_public_keys()
            && self.activation_delay() == other.activation_delay()
    }
}

impl Eq for Federation {}

impl fmt::Display for Federation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Got {} of {} signatures federation with address {}",
            self.number_of_signatures_required(),
            self.size(),
            self.address
        )
    }
}

fn btc_public_keys(members: &[FederationMember]) -> Vec<PublicKey> {
    members.iter().map(|member| *member.btc_public_key()).collect()
}

fn validate_members(members: &[FederationMember]) -> Result<(), FederationError> {
    if members.is_empty() {
        return Err(FederationError::EmptyMembers);
    }
    let mut seen = HashSet::with_capacity(members.len());
    for member in members {
        if !seen.insert(member.btc_public_key()) {
            return Err(FederationError::DuplicateMember(*member.btc_public_key()));
        }
    }
    Ok(())
}
