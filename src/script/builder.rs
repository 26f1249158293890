//! Redeem script builders
//!
//! Standard multisig construction, CSV encodings, and the P2SH-compatible
//! ERP builder. The legacy non-standard ERP builders live in
//! [`super::non_standard`].

use bitcoin::opcodes::all::{OP_CHECKMULTISIG, OP_CSV, OP_DROP, OP_ELSE, OP_ENDIF, OP_NOTIF};
use bitcoin::script::{Builder, PushBytes, ScriptBuf};
use log::debug;
use secp256k1::PublicKey;

use super::parser::{append_instructions, instructions};
use super::validation::{
    validate_multisig_structure, validate_script_size, validate_threshold, validate_timelock,
    RedeemScriptError,
};

// =============================================================================
// Builder trait
// =============================================================================

/// Produces an emergency-recovery redeem script from its two key sets
///
/// Key order is significant: keys are placed in the script exactly in the
/// order given, so permuting them yields a different script.
pub trait ErpRedeemScriptBuilder {
    fn create_redeem_script(
        &self,
        default_public_keys: &[PublicKey],
        default_threshold: usize,
        emergency_public_keys: &[PublicKey],
        emergency_threshold: usize,
        csv_value: u64,
    ) -> Result<ScriptBuf, RedeemScriptError>;
}

// =============================================================================
// Multisig helpers
// =============================================================================

/// Push `M <keys> N` onto a builder
pub(crate) fn push_multisig_body(
    mut builder: Builder,
    public_keys: &[PublicKey],
    threshold: usize,
) -> Result<Builder, RedeemScriptError> {
    validate_threshold(threshold, public_keys.len())?;

    builder = builder.push_int(threshold as i64);
    for key in public_keys {
        builder = builder.push_key(&bitcoin::PublicKey::new(*key));
    }
    Ok(builder.push_int(public_keys.len() as i64))
}

/// Build a standard `M <keys> N CHECKMULTISIG` redeem script
pub fn create_multisig_redeem_script(
    public_keys: &[PublicKey],
    threshold: usize,
) -> Result<ScriptBuf, RedeemScriptError> {
    let script = push_multisig_body(Builder::new(), public_keys, threshold)?
        .push_opcode(OP_CHECKMULTISIG)
        .into_script();
    validate_script_size(&script)?;
    Ok(script)
}

/// Majority threshold used by federations: `n / 2 + 1`
pub fn majority_threshold(keys: usize) -> usize {
    keys / 2 + 1
}

// =============================================================================
// CSV encodings
// =============================================================================

/// Encode a CSV value as a minimal signed little-endian script number
pub fn encode_csv_signed_le(csv_value: u64) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut remaining = csv_value;
    while remaining > 0 {
        bytes.push((remaining & 0xff) as u8);
        remaining >>= 8;
    }
    // keep the value positive when the top bit is set
    if bytes.last().map_or(false, |byte| byte & 0x80 != 0) {
        bytes.push(0x00);
    }
    bytes
}

/// Encode a CSV value as two unsigned big-endian bytes (legacy encoding)
pub fn encode_csv_unsigned_be(csv_value: u16) -> Vec<u8> {
    csv_value.to_be_bytes().to_vec()
}

pub(crate) fn push_bytes(bytes: &[u8]) -> Result<&PushBytes, RedeemScriptError> {
    <&PushBytes>::try_from(bytes)
        .map_err(|e| RedeemScriptError::malformed(format!("unpushable data: {}", e)))
}

// =============================================================================
// P2SH ERP builder
// =============================================================================

/// ERP builder whose branches each end in CHECKMULTISIG, making the script
/// standard for P2SH relay:
///
/// ```text
/// NOTIF M <keys> N CHECKMULTISIG ELSE <csv> CSV DROP M' <keys'> N' CHECKMULTISIG ENDIF
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct P2shErpRedeemScriptBuilder;

impl ErpRedeemScriptBuilder for P2shErpRedeemScriptBuilder {
    fn create_redeem_script(
        &self,
        default_public_keys: &[PublicKey],
        default_threshold: usize,
        emergency_public_keys: &[PublicKey],
        emergency_threshold: usize,
        csv_value: u64,
    ) -> Result<ScriptBuf, RedeemScriptError> {
        if emergency_public_keys.is_empty() {
            return Err(RedeemScriptError::EmptyEmergencyKeySet);
        }
        validate_timelock(csv_value)?;
        let default_multisig = create_multisig_redeem_script(default_public_keys, default_threshold)?;
        let emergency_multisig =
            create_multisig_redeem_script(emergency_public_keys, emergency_threshold)?;
        validate_multisig_structure(&default_multisig, &emergency_multisig)?;

        let csv_bytes = encode_csv_signed_le(csv_value);

        let mut builder = Builder::new().push_opcode(OP_NOTIF);
        builder = append_instructions(builder, &instructions(&default_multisig)?);
        builder = builder
            .push_opcode(OP_ELSE)
            .push_slice(push_bytes(&csv_bytes)?)
            .push_opcode(OP_CSV)
            .push_opcode(OP_DROP);
        builder = append_instructions(builder, &instructions(&emergency_multisig)?);
        let script = builder.push_opcode(OP_ENDIF).into_script();

        validate_script_size(&script)?;
        debug!(
            "Built P2SH ERP redeem script ({} bytes, csv {})",
            script.len(),
            csv_value
        );
        Ok(script)
    }
}
