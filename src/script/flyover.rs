//! Flyover (fast-bridge) derived redeem scripts
//!
//! A flyover script commits to a 32-byte derivation hash by prefixing a
//! federation's redeem script with `<hash> OP_DROP`. The prefix changes the
//! P2SH address without changing who can spend from it.

use bitcoin::opcodes::all::OP_DROP;
use bitcoin::script::{Builder, Instruction, Script, ScriptBuf};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::builder::push_bytes;
use super::non_standard::push_non_standard_erp;
use super::parser::{instructions, parse_erp_redeem_script, parse_multisig, ErpScriptLayout};
use super::validation::{validate_script_size, RedeemScriptError};
use crate::crypto::{keccak256, LedgerAddress};

/// Length of the `<hash> OP_DROP` prefix: one push opcode, 32 bytes, one drop
const FLYOVER_PREFIX_LENGTH: usize = 34;

/// Hash committing a flyover deposit to its derivation arguments
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DerivationArgumentsHash(#[serde(with = "hex::serde")] [u8; 32]);

impl DerivationArgumentsHash {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash the arguments a liquidity provider commits to for one deposit:
    /// `keccak256(derivation_hash || user_refund_address || lbc_address || lp_btc_address)`
    pub fn from_flyover_arguments(
        derivation_hash: &[u8; 32],
        user_refund_address: &[u8],
        lbc_address: &LedgerAddress,
        liquidity_provider_btc_address: &[u8],
    ) -> Self {
        let mut preimage = Vec::with_capacity(
            32 + user_refund_address.len() + 20 + liquidity_provider_btc_address.len(),
        );
        preimage.extend_from_slice(derivation_hash);
        preimage.extend_from_slice(user_refund_address);
        preimage.extend_from_slice(lbc_address.as_bytes());
        preimage.extend_from_slice(liquidity_provider_btc_address);
        Self(keccak256(&preimage))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn prefix(&self) -> Result<Builder, RedeemScriptError> {
        Ok(Builder::new()
            .push_slice(push_bytes(&self.0)?)
            .push_opcode(OP_DROP))
    }
}

impl fmt::Display for DerivationArgumentsHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

fn prefix_redeem_script(
    redeem_script: &Script,
    derivation_hash: &DerivationArgumentsHash,
) -> Result<ScriptBuf, RedeemScriptError> {
    let mut bytes = derivation_hash.prefix()?.into_script().into_bytes();
    bytes.extend_from_slice(redeem_script.as_bytes());
    let script = ScriptBuf::from_bytes(bytes);

    validate_script_size(&script)?;
    Ok(script)
}

/// Prefix a standard multisig redeem script with `<hash> OP_DROP`
pub fn create_flyover_redeem_script(
    redeem_script: &Script,
    derivation_hash: &DerivationArgumentsHash,
) -> Result<ScriptBuf, RedeemScriptError> {
    parse_multisig(redeem_script)?;
    prefix_redeem_script(redeem_script, derivation_hash)
}

/// Build the flyover variant of an ERP redeem script
///
/// P2SH ERP scripts are prefixed with `<hash> OP_DROP` unchanged. Non-standard
/// scripts are split into their default multisig, CSV push and emergency
/// multisig, then rebuilt behind the prefix with the CSV push carried over
/// byte for byte.
pub fn create_flyover_erp_redeem_script(
    erp_redeem_script: &Script,
    derivation_hash: &DerivationArgumentsHash,
) -> Result<ScriptBuf, RedeemScriptError> {
    let parts = parse_erp_redeem_script(erp_redeem_script)?;
    if parts.layout == ErpScriptLayout::P2sh {
        return prefix_redeem_script(erp_redeem_script, derivation_hash);
    }

    let script = push_non_standard_erp(
        derivation_hash.prefix()?,
        &parts.default_multisig,
        &parts.csv_bytes,
        &parts.emergency_multisig,
    )?
    .into_script();

    validate_script_size(&script)?;
    Ok(script)
}

/// Derive the flyover script for any federation redeem script
pub fn derive_flyover_redeem_script(
    redeem_script: &Script,
    derivation_hash: &DerivationArgumentsHash,
) -> Result<ScriptBuf, RedeemScriptError> {
    if parse_multisig(redeem_script).is_ok() {
        create_flyover_redeem_script(redeem_script, derivation_hash)
    } else {
        create_flyover_erp_redeem_script(redeem_script, derivation_hash)
    }
}

/// Split a flyover script into its derivation hash and the script it wraps
pub fn strip_flyover_prefix(script: &Script) -> Option<(DerivationArgumentsHash, ScriptBuf)> {
    let parsed = instructions(script).ok()?;
    match parsed.as_slice() {
        [Instruction::PushBytes(hash), Instruction::Op(op), ..] if *op == OP_DROP => {
            let hash: [u8; 32] = hash.as_bytes().try_into().ok()?;
            let inner = script.as_bytes().get(FLYOVER_PREFIX_LENGTH..)?;
            Some((
                DerivationArgumentsHash(hash),
                ScriptBuf::from_bytes(inner.to_vec()),
            ))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::script::builder::{
        create_multisig_redeem_script, ErpRedeemScriptBuilder, P2shErpRedeemScriptBuilder,
    };
    use crate::script::non_standard::NonStandardErpRedeemScriptBuilder;
    use secp256k1::PublicKey;

    fn keys(prefix: &str, count: usize) -> Vec<PublicKey> {
        (0..count)
            .map(|i| KeyPair::from_seed(&format!("{}{}", prefix, i)).unwrap().public_key)
            .collect()
    }

    fn hash() -> DerivationArgumentsHash {
        DerivationArgumentsHash::new([0xab; 32])
    }

    #[test]
    fn test_flyover_prefix_layout() {
        let redeem = create_multisig_redeem_script(&keys("fed", 3), 2).unwrap();
        let flyover = create_flyover_redeem_script(&redeem, &hash()).unwrap();
        let bytes = flyover.as_bytes();

        assert_eq!(bytes[0], 0x20);
        assert_eq!(&bytes[1..33], &[0xab; 32]);
        assert_eq!(bytes[33], 0x75);
        assert_eq!(&bytes[FLYOVER_PREFIX_LENGTH..], redeem.as_bytes());
    }

    #[test]
    fn test_strip_flyover_prefix() {
        let redeem = create_multisig_redeem_script(&keys("fed", 3), 2).unwrap();
        let flyover = create_flyover_redeem_script(&redeem, &hash()).unwrap();

        let (stripped_hash, inner) = strip_flyover_prefix(&flyover).unwrap();
        assert_eq!(stripped_hash, hash());
        assert_eq!(inner, redeem);
        assert!(strip_flyover_prefix(&redeem).is_none());
    }

    #[test]
    fn test_different_hashes_give_different_scripts() {
        let redeem = create_multisig_redeem_script(&keys("fed", 3), 2).unwrap();
        let other = DerivationArgumentsHash::new([0x01; 32]);

        assert_ne!(
            create_flyover_redeem_script(&redeem, &hash()).unwrap(),
            create_flyover_redeem_script(&redeem, &other).unwrap()
        );
    }

    #[test]
    fn test_flyover_erp_keeps_non_standard_layout() {
        let erp = NonStandardErpRedeemScriptBuilder
            .create_redeem_script(&keys("default", 5), 3, &keys("emergency", 3), 2, 500)
            .unwrap();
        let flyover = derive_flyover_redeem_script(&erp, &hash()).unwrap();

        let (_, inner) = strip_flyover_prefix(&flyover).unwrap();
        assert_eq!(inner, erp);
    }

    #[test]
    fn test_flyover_from_p2sh_erp_keeps_p2sh_layout() {
        let erp = P2shErpRedeemScriptBuilder
            .create_redeem_script(&keys("default", 5), 3, &keys("emergency", 3), 2, 500)
            .unwrap();
        let flyover = derive_flyover_redeem_script(&erp, &hash()).unwrap();

        assert_eq!(flyover, create_flyover_erp_redeem_script(&erp, &hash()).unwrap());
        assert_eq!(&flyover.as_bytes()[FLYOVER_PREFIX_LENGTH..], erp.as_bytes());

        let (_, inner) = strip_flyover_prefix(&flyover).unwrap();
        assert_eq!(inner, erp);
        assert_eq!(
            parse_erp_redeem_script(&inner).unwrap().layout,
            ErpScriptLayout::P2sh
        );
    }

    #[test]
    fn test_flyover_rejects_oversized_script() {
        // 15 keys fit a plain multisig but not with the 34 byte prefix
        let redeem = create_multisig_redeem_script(&keys("fed", 15), 8).unwrap();
        assert!(matches!(
            create_flyover_redeem_script(&redeem, &hash()),
            Err(RedeemScriptError::ScriptTooLarge { .. })
        ));
    }

    #[test]
    fn test_derivation_arguments_hash_is_deterministic() {
        let lbc = LedgerAddress::new([0x11; 20]);
        let first = DerivationArgumentsHash::from_flyover_arguments(&[0x22; 32], b"refund", &lbc, b"lp");
        let second =
            DerivationArgumentsHash::from_flyover_arguments(&[0x22; 32], b"refund", &lbc, b"lp");
        let other =
            DerivationArgumentsHash::from_flyover_arguments(&[0x22; 32], b"refund", &lbc, b"lp2");

        assert_eq!(first, second);
        assert_ne!(first, other);
    }
}
