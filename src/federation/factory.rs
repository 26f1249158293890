//! Federation format versions and builder selection
//!
//! Which redeem script a federation gets depends on the network and on the
//! consensus rules active at its creation height. Old federations must be
//! rebuilt byte for byte, so every historical branch stays here.

use bitcoin::script::ScriptBuf;
use bitcoin::Network;
use log::debug;
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::federation::{ErpParameters, Federation, FederationArgs, FederationError};
use crate::config::{ActivationSource, ConsensusRule, FederationConstants};
use crate::script::{
    ErpRedeemScriptBuilder, NonStandardErpRedeemScriptBuilder,
    NonStandardErpRedeemScriptBuilderHardcoded,
    NonStandardErpRedeemScriptBuilderWithCsvUnsignedBe, P2shErpRedeemScriptBuilder,
    RedeemScriptError,
};

// =============================================================================
// Format versions
// =============================================================================

/// Persisted tag identifying how a stored federation must be rebuilt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum FederationFormatVersion {
    StandardMultisig,
    NonStandardErp,
    P2shErp,
}

impl FederationFormatVersion {
    pub fn as_u32(&self) -> u32 {
        match self {
            FederationFormatVersion::StandardMultisig => 1000,
            FederationFormatVersion::NonStandardErp => 2000,
            FederationFormatVersion::P2shErp => 3000,
        }
    }
}

impl TryFrom<u32> for FederationFormatVersion {
    type Error = FederationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1000 => Ok(FederationFormatVersion::StandardMultisig),
            2000 => Ok(FederationFormatVersion::NonStandardErp),
            3000 => Ok(FederationFormatVersion::P2shErp),
            other => Err(FederationError::UnknownFederationFormatVersion(other)),
        }
    }
}

impl From<FederationFormatVersion> for u32 {
    fn from(version: FederationFormatVersion) -> Self {
        version.as_u32()
    }
}

impl fmt::Display for FederationFormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

// =============================================================================
// Builder kinds
// =============================================================================

/// The ERP redeem script builder a federation was created with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErpBuilderKind {
    /// Fixed testnet script
    NonStandardHardcoded,
    /// Non-standard layout with the CSV value as unsigned big-endian
    NonStandardCsvUnsignedBe,
    /// Non-standard layout with the CSV value as signed little-endian
    NonStandard,
    /// P2SH-standard layout
    P2sh,
}

impl ErpBuilderKind {
    fn builder(&self) -> &'static dyn ErpRedeemScriptBuilder {
        match self {
            ErpBuilderKind::NonStandardHardcoded => &NonStandardErpRedeemScriptBuilderHardcoded,
            ErpBuilderKind::NonStandardCsvUnsignedBe => {
                &NonStandardErpRedeemScriptBuilderWithCsvUnsignedBe
            }
            ErpBuilderKind::NonStandard => &NonStandardErpRedeemScriptBuilder,
            ErpBuilderKind::P2sh => &P2shErpRedeemScriptBuilder,
        }
    }

    pub fn format_version(&self) -> FederationFormatVersion {
        match self {
            ErpBuilderKind::P2sh => FederationFormatVersion::P2shErp,
            _ => FederationFormatVersion::NonStandardErp,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErpBuilderKind::NonStandardHardcoded => "non_standard_hardcoded",
            ErpBuilderKind::NonStandardCsvUnsignedBe => "non_standard_csv_unsigned_be",
            ErpBuilderKind::NonStandard => "non_standard",
            ErpBuilderKind::P2sh => "p2sh",
        }
    }
}

impl ErpRedeemScriptBuilder for ErpBuilderKind {
    fn create_redeem_script(
        &self,
        default_public_keys: &[PublicKey],
        default_threshold: usize,
        emergency_public_keys: &[PublicKey],
        emergency_threshold: usize,
        csv_value: u64,
    ) -> Result<ScriptBuf, RedeemScriptError> {
        self.builder().create_redeem_script(
            default_public_keys,
            default_threshold,
            emergency_public_keys,
            emergency_threshold,
            csv_value,
        )
    }
}

impl fmt::Display for ErpBuilderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Selection
// =============================================================================

/// Pick the non-standard ERP builder for a network and activation snapshot
///
/// | network | rskip284 | rskip293 | builder                   |
/// |---------|----------|----------|---------------------------|
/// | testnet | off      | any      | hardcoded                 |
/// | any     | any      | off      | csv unsigned big-endian   |
/// | any     | any      | on       | csv signed little-endian  |
pub fn select_non_standard_builder(
    network: Network,
    activations: &dyn ActivationSource,
) -> ErpBuilderKind {
    let kind = if network == Network::Testnet
        && !activations.is_active(ConsensusRule::ErpScriptFromParameters)
    {
        ErpBuilderKind::NonStandardHardcoded
    } else if !activations.is_active(ConsensusRule::CsvSignedLittleEndian) {
        ErpBuilderKind::NonStandardCsvUnsignedBe
    } else {
        ErpBuilderKind::NonStandard
    };
    debug!("Selected {} ERP builder for {}", kind, network);
    kind
}

/// Format a federation created under these activations should use
pub fn select_federation_format(activations: &dyn ActivationSource) -> FederationFormatVersion {
    if !activations.is_active(ConsensusRule::ErpFederations) {
        FederationFormatVersion::StandardMultisig
    } else if activations.is_active(ConsensusRule::P2shErpFederations) {
        FederationFormatVersion::P2shErp
    } else {
        FederationFormatVersion::NonStandardErp
    }
}

/// Builder for a federation of the given format, `None` for standard
/// multisig federations
pub fn select_erp_builder(
    format: FederationFormatVersion,
    network: Network,
    activations: &dyn ActivationSource,
) -> Option<ErpBuilderKind> {
    match format {
        FederationFormatVersion::StandardMultisig => None,
        FederationFormatVersion::NonStandardErp => {
            Some(select_non_standard_builder(network, activations))
        }
        FederationFormatVersion::P2shErp => Some(ErpBuilderKind::P2sh),
    }
}

/// Build a federation of the given format, taking emergency keys and delay
/// from the network constants
pub fn build_federation(
    format: FederationFormatVersion,
    args: FederationArgs,
    constants: &FederationConstants,
    activations: &dyn ActivationSource,
) -> Result<Federation, FederationError> {
    match select_erp_builder(format, args.network, activations) {
        None => Federation::standard_multisig(args),
        Some(builder) => {
            let erp = ErpParameters::new(
                constants.erp_fed_pub_keys.clone(),
                constants.erp_fed_activation_delay,
                builder,
            )?;
            Federation::erp(args, erp)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActivationConfig, ActivationsForBlock};
    use crate::crypto::KeyPair;
    use crate::federation::FederationMember;
    use chrono::{TimeZone, Utc};

    fn activations(rules: &[ConsensusRule]) -> ActivationsForBlock {
        ActivationsForBlock::from_rules(0, rules.iter().copied())
    }

    fn args(network: Network) -> FederationArgs {
        let keys: Vec<_> = (0..5)
            .map(|i| KeyPair::from_seed(&format!("member{}", i)).unwrap().public_key)
            .collect();
        FederationArgs::new(
            FederationMember::from_btc_public_keys(&keys),
            Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
            100,
            network,
        )
    }

    #[test]
    fn test_format_version_tags() {
        for version in [
            FederationFormatVersion::StandardMultisig,
            FederationFormatVersion::NonStandardErp,
            FederationFormatVersion::P2shErp,
        ] {
            assert_eq!(FederationFormatVersion::try_from(version.as_u32()).unwrap(), version);
        }
        assert_eq!(
            FederationFormatVersion::try_from(4000),
            Err(FederationError::UnknownFederationFormatVersion(4000))
        );
        assert_eq!(serde_json::to_string(&FederationFormatVersion::P2shErp).unwrap(), "3000");
        assert!(serde_json::from_str::<FederationFormatVersion>("1234").is_err());
    }

    #[test]
    fn test_testnet_before_modernization_uses_hardcoded() {
        assert_eq!(
            select_non_standard_builder(Network::Testnet, &activations(&[])),
            ErpBuilderKind::NonStandardHardcoded
        );
        assert_eq!(
            select_non_standard_builder(
                Network::Testnet,
                &activations(&[ConsensusRule::CsvSignedLittleEndian])
            ),
            ErpBuilderKind::NonStandardHardcoded
        );
    }

    #[test]
    fn test_csv_encoding_selection() {
        for network in [Network::Bitcoin, Network::Regtest] {
            assert_eq!(
                select_non_standard_builder(network, &activations(&[])),
                ErpBuilderKind::NonStandardCsvUnsignedBe
            );
            assert_eq!(
                select_non_standard_builder(
                    network,
                    &activations(&[ConsensusRule::CsvSignedLittleEndian])
                ),
                ErpBuilderKind::NonStandard
            );
        }
        assert_eq!(
            select_non_standard_builder(
                Network::Testnet,
                &activations(&[ConsensusRule::ErpScriptFromParameters])
            ),
            ErpBuilderKind::NonStandardCsvUnsignedBe
        );
        assert_eq!(
            select_non_standard_builder(
                Network::Testnet,
                &activations(&[
                    ConsensusRule::ErpScriptFromParameters,
                    ConsensusRule::CsvSignedLittleEndian
                ])
            ),
            ErpBuilderKind::NonStandard
        );
    }

    #[test]
    fn test_selection_is_idempotent() {
        let snapshot = ActivationConfig::testnet().for_block(3_000_000);
        let first = select_non_standard_builder(Network::Testnet, &snapshot);
        for _ in 0..3 {
            assert_eq!(select_non_standard_builder(Network::Testnet, &snapshot), first);
        }
    }

    #[test]
    fn test_select_federation_format() {
        assert_eq!(
            select_federation_format(&activations(&[])),
            FederationFormatVersion::StandardMultisig
        );
        assert_eq!(
            select_federation_format(&activations(&[ConsensusRule::ErpFederations])),
            FederationFormatVersion::NonStandardErp
        );
        assert_eq!(
            select_federation_format(&activations(&[
                ConsensusRule::ErpFederations,
                ConsensusRule::P2shErpFederations
            ])),
            FederationFormatVersion::P2shErp
        );
    }

    #[test]
    fn test_select_erp_builder() {
        let none = activations(&[]);
        assert_eq!(
            select_erp_builder(FederationFormatVersion::StandardMultisig, Network::Bitcoin, &none),
            None
        );
        assert_eq!(
            select_erp_builder(FederationFormatVersion::P2shErp, Network::Testnet, &none),
            Some(ErpBuilderKind::P2sh)
        );
        assert_eq!(
            select_erp_builder(FederationFormatVersion::NonStandardErp, Network::Testnet, &none),
            Some(ErpBuilderKind::NonStandardHardcoded)
        );
    }

    #[test]
    fn test_build_federation_for_each_format() {
        let constants = FederationConstants::regtest().unwrap();
        let all = ActivationConfig::all_active().for_block(100);

        let standard = build_federation(
            FederationFormatVersion::StandardMultisig,
            args(Network::Regtest),
            &constants,
            &all,
        )
        .unwrap();
        assert_eq!(standard.format_version(), FederationFormatVersion::StandardMultisig);

        let non_standard = build_federation(
            FederationFormatVersion::NonStandardErp,
            args(Network::Regtest),
            &constants,
            &all,
        )
        .unwrap();
        assert_eq!(non_standard.format_version(), FederationFormatVersion::NonStandardErp);
        assert_eq!(
            non_standard.erp_parameters().unwrap().builder(),
            ErpBuilderKind::NonStandard
        );
        assert_eq!(
            non_standard.emergency_public_keys().unwrap(),
            constants.erp_fed_pub_keys.as_slice()
        );

        let p2sh = build_federation(
            FederationFormatVersion::P2shErp,
            args(Network::Regtest),
            &constants,
            &all,
        )
        .unwrap();
        assert_eq!(p2sh.format_version(), FederationFormatVersion::P2shErp);
        assert_ne!(p2sh.redeem_script(), non_standard.redeem_script());
        assert_eq!(p2sh.standard_redeem_script(), standard.redeem_script());
    }

    #[test]
    fn test_builder_kind_delegates() {
        let keys: Vec<_> = (0..3)
            .map(|i| KeyPair::from_seed(&format!("k{}", i)).unwrap().public_key)
            .collect();
        let via_kind = ErpBuilderKind::P2sh
            .create_redeem_script(&keys, 2, &keys, 2, 10)
            .unwrap();
        let direct = P2shErpRedeemScriptBuilder
            .create_redeem_script(&keys, 2, &keys, 2, 10)
            .unwrap();
        assert_eq!(via_kind, direct);
        assert_eq!(ErpBuilderKind::NonStandard.to_string(), "non_standard");
    }
}
