//! Legacy (non-standard) ERP redeem script builders
//!
//! All three share the layout
//!
//! ```text
//! NOTIF M <keys> N ELSE <csv> CSV DROP M' <keys'> N' ENDIF CHECKMULTISIG
//! ```
//!
//! and differ only in how the CSV value is pushed. The non-shared
//! CHECKMULTISIG keeps these scripts out of standard relay policy.

use bitcoin::opcodes::all::{OP_CHECKMULTISIG, OP_CSV, OP_DROP, OP_ELSE, OP_ENDIF, OP_NOTIF};
use bitcoin::script::{Builder, ScriptBuf};
use log::{debug, warn};
use secp256k1::PublicKey;

use super::builder::{
    create_multisig_redeem_script, encode_csv_signed_le, encode_csv_unsigned_be, push_bytes,
    push_multisig_body, ErpRedeemScriptBuilder,
};
use super::parser::MultisigScript;
use super::validation::{
    validate_multisig_structure, validate_script_size, validate_timelock, RedeemScriptError,
};

/// Fixed testnet ERP script used before ERP scripts were built from parameters
const HARDCODED_TESTNET_ERP_SCRIPT: &str = "6453210208f40073a9e43b3e9103acec79767a6de9b0409749884e989960fee578012fce210225e892391625854128c5c4ea4340de0c2a70570f33db53426fc9c746597a03f42102afc230c2d355b1a577682b07bc2646041b5d0177af0f98395a46018da699b6da210344a3c38cd59afcba3edcebe143e025574594b001700dec41e59409bdbd0f2a0921039a060badbeb24bee49eb2063f616c0f0f0765d4ca646b20a88ce828f259fcdb955670300cd50b27552210216c23b2ea8e4f11c3f9e22711addb1d16a93964796913830856b568cc3ea21d3210275562901dd8faae20de0a4166362a4f82188db77dbed4ca887422ea1ec185f1421034db69f2112f4fb1bb6141bf6e2bd6631f0484d0bd95b16767902c9fe219d4a6f5368ae";

/// Push the non-standard ERP layout onto a builder, around an already
/// encoded CSV push
pub(crate) fn push_non_standard_erp(
    mut builder: Builder,
    default_multisig: &MultisigScript,
    csv_bytes: &[u8],
    emergency_multisig: &MultisigScript,
) -> Result<Builder, RedeemScriptError> {
    builder = builder.push_opcode(OP_NOTIF);
    builder = push_multisig_body(
        builder,
        &default_multisig.public_keys,
        default_multisig.threshold,
    )?;
    builder = builder
        .push_opcode(OP_ELSE)
        .push_slice(push_bytes(csv_bytes)?)
        .push_opcode(OP_CSV)
        .push_opcode(OP_DROP);
    builder = push_multisig_body(
        builder,
        &emergency_multisig.public_keys,
        emergency_multisig.threshold,
    )?;
    Ok(builder.push_opcode(OP_ENDIF).push_opcode(OP_CHECKMULTISIG))
}

fn build_non_standard_erp_script(
    default_public_keys: &[PublicKey],
    default_threshold: usize,
    emergency_public_keys: &[PublicKey],
    emergency_threshold: usize,
    csv_value: u64,
    csv_bytes: &[u8],
) -> Result<ScriptBuf, RedeemScriptError> {
    if emergency_public_keys.is_empty() {
        return Err(RedeemScriptError::EmptyEmergencyKeySet);
    }
    validate_timelock(csv_value)?;
    let default_script = create_multisig_redeem_script(default_public_keys, default_threshold)?;
    let emergency_script =
        create_multisig_redeem_script(emergency_public_keys, emergency_threshold)?;
    validate_multisig_structure(&default_script, &emergency_script)?;

    let default_multisig = MultisigScript {
        threshold: default_threshold,
        public_keys: default_public_keys.to_vec(),
    };
    let emergency_multisig = MultisigScript {
        threshold: emergency_threshold,
        public_keys: emergency_public_keys.to_vec(),
    };
    let script = push_non_standard_erp(
        Builder::new(),
        &default_multisig,
        csv_bytes,
        &emergency_multisig,
    )?
    .into_script();

    validate_script_size(&script)?;
    Ok(script)
}

/// Non-standard ERP builder pushing the CSV value as a signed
/// little-endian script number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NonStandardErpRedeemScriptBuilder;

impl ErpRedeemScriptBuilder for NonStandardErpRedeemScriptBuilder {
    fn create_redeem_script(
        &self,
        default_public_keys: &[PublicKey],
        default_threshold: usize,
        emergency_public_keys: &[PublicKey],
        emergency_threshold: usize,
        csv_value: u64,
    ) -> Result<ScriptBuf, RedeemScriptError> {
        let script = build_non_standard_erp_script(
            default_public_keys,
            default_threshold,
            emergency_public_keys,
            emergency_threshold,
            csv_value,
            &encode_csv_signed_le(csv_value),
        )?;
        debug!("Built non-standard ERP redeem script ({} bytes)", script.len());
        Ok(script)
    }
}

/// Non-standard ERP builder pushing the CSV value as two unsigned
/// big-endian bytes, as scripts were built before the encoding fix
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NonStandardErpRedeemScriptBuilderWithCsvUnsignedBe;

impl ErpRedeemScriptBuilder for NonStandardErpRedeemScriptBuilderWithCsvUnsignedBe {
    fn create_redeem_script(
        &self,
        default_public_keys: &[PublicKey],
        default_threshold: usize,
        emergency_public_keys: &[PublicKey],
        emergency_threshold: usize,
        csv_value: u64,
    ) -> Result<ScriptBuf, RedeemScriptError> {
        let csv = u16::try_from(csv_value)
            .map_err(|_| RedeemScriptError::InvalidTimelock(csv_value))?;
        let script = build_non_standard_erp_script(
            default_public_keys,
            default_threshold,
            emergency_public_keys,
            emergency_threshold,
            csv_value,
            &encode_csv_unsigned_be(csv),
        )?;
        debug!(
            "Built non-standard ERP redeem script with unsigned BE csv ({} bytes)",
            script.len()
        );
        Ok(script)
    }
}

/// Builder returning the fixed testnet ERP script regardless of its inputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NonStandardErpRedeemScriptBuilderHardcoded;

impl ErpRedeemScriptBuilder for NonStandardErpRedeemScriptBuilderHardcoded {
    fn create_redeem_script(
        &self,
        _default_public_keys: &[PublicKey],
        _default_threshold: usize,
        _emergency_public_keys: &[PublicKey],
        _emergency_threshold: usize,
        _csv_value: u64,
    ) -> Result<ScriptBuf, RedeemScriptError> {
        warn!("Using hardcoded testnet ERP redeem script, inputs are ignored");
        let bytes = hex::decode(HARDCODED_TESTNET_ERP_SCRIPT)
            .map_err(|e| RedeemScriptError::malformed(e.to_string()))?;
        Ok(ScriptBuf::from_bytes(bytes))
    }
}
