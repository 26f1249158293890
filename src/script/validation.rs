//! Redeem script validation rules
//!
//! Every builder runs its output through these checks before handing it
//! out, so a script obtained from this crate is always spendable.

use bitcoin::script::Script;
use thiserror::Error;

use super::parser::parse_multisig;
use crate::error::ErrorReason;

// =============================================================================
// Constants
// =============================================================================

/// Maximum size in bytes of a single pushed stack element. A P2SH redeem
/// script is pushed whole in the spending input, so it must fit here.
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Largest relative timelock (in blocks) that CHECKSEQUENCEVERIFY honors
pub const MAX_CSV_VALUE: u64 = 65_535;

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while building or parsing redeem scripts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RedeemScriptError {
    #[error("Invalid timelock value {0}, must be between 1 and {max}", max = MAX_CSV_VALUE)]
    InvalidTimelock(u64),
    #[error("Emergency key set cannot be empty")]
    EmptyEmergencyKeySet,
    #[error("Script too large: {size} bytes exceeds the {max} byte limit", max = MAX_SCRIPT_ELEMENT_SIZE)]
    ScriptTooLarge { size: usize },
    #[error("Invalid threshold: {threshold} of {keys} keys")]
    InvalidThreshold { threshold: usize, keys: usize },
    #[error("Malformed redeem script: {0}")]
    MalformedRedeemScript(String),
}

impl RedeemScriptError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        RedeemScriptError::MalformedRedeemScript(message.into())
    }

    pub fn reason(&self) -> ErrorReason {
        match self {
            RedeemScriptError::InvalidTimelock(_) => ErrorReason::InvalidTimelock,
            RedeemScriptError::EmptyEmergencyKeySet => ErrorReason::EmptyEmergencyKeySet,
            RedeemScriptError::ScriptTooLarge { .. } => ErrorReason::ScriptTooLarge,
            RedeemScriptError::InvalidThreshold { .. } => ErrorReason::InvalidThreshold,
            RedeemScriptError::MalformedRedeemScript(_) => ErrorReason::MalformedRedeemScript,
        }
    }
}

// =============================================================================
// Validators
// =============================================================================

/// Check that a CSV value lies within `[1, MAX_CSV_VALUE]`
pub fn validate_timelock(csv_value: u64) -> Result<(), RedeemScriptError> {
    if csv_value == 0 || csv_value > MAX_CSV_VALUE {
        return Err(RedeemScriptError::InvalidTimelock(csv_value));
    }
    Ok(())
}

/// Check that a script fits in a single stack element
pub fn validate_script_size(script: &Script) -> Result<(), RedeemScriptError> {
    let size = script.len();
    if size > MAX_SCRIPT_ELEMENT_SIZE {
        return Err(RedeemScriptError::ScriptTooLarge { size });
    }
    Ok(())
}

/// Check `1 <= threshold <= keys` for a multisig
pub fn validate_threshold(threshold: usize, keys: usize) -> Result<(), RedeemScriptError> {
    if keys == 0 {
        return Err(RedeemScriptError::malformed("multisig requires at least one key"));
    }
    if threshold == 0 || threshold > keys {
        return Err(RedeemScriptError::InvalidThreshold { threshold, keys });
    }
    Ok(())
}

/// Check that both branches of an ERP script are well-formed multisigs
pub fn validate_multisig_structure(
    default_multisig: &Script,
    emergency_multisig: &Script,
) -> Result<(), RedeemScriptError> {
    parse_multisig(default_multisig)?;
    parse_multisig(emergency_multisig)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::opcodes::all::OP_CHECKMULTISIG;
    use bitcoin::script::{Builder, PushBytesBuf, ScriptBuf};

    fn push_data(len: usize) -> PushBytesBuf {
        PushBytesBuf::try_from(vec![0u8; len]).unwrap()
    }

    #[test]
    fn test_timelock_bounds() {
        for invalid in [0, 65_536, 100_000, 8_400_000] {
            assert_eq!(
                validate_timelock(invalid),
                Err(RedeemScriptError::InvalidTimelock(invalid))
            );
        }
        assert!(validate_timelock(1).is_ok());
        assert!(validate_timelock(MAX_CSV_VALUE).is_ok());
    }

    #[test]
    fn test_script_size_limit() {
        let at_limit = Builder::new().push_slice(push_data(75)).into_script();
        assert!(validate_script_size(&at_limit).is_ok());

        let mut builder = Builder::new();
        for _ in 0..8 {
            builder = builder.push_slice(push_data(70));
        }
        let too_large = builder.push_opcode(OP_CHECKMULTISIG).into_script();
        assert_eq!(
            validate_script_size(&too_large),
            Err(RedeemScriptError::ScriptTooLarge { size: 569 })
        );
    }

    #[test]
    fn test_multisig_structure() {
        let multisig = ScriptBuf::from_bytes(
            hex::decode("5121027319afb15481dbeb3c426bcc37f9a30e7f51ceff586936d85548d9395bcc234451ae")
                .unwrap(),
        );
        let not_multisig = ScriptBuf::from_bytes(vec![0x51, 0x51, 0x87]);

        assert!(validate_multisig_structure(&multisig, &multisig).is_ok());
        assert_eq!(
            validate_multisig_structure(&multisig, &not_multisig)
                .unwrap_err()
                .reason(),
            ErrorReason::MalformedRedeemScript
        );
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(validate_threshold(1, 1).is_ok());
        assert!(validate_threshold(3, 5).is_ok());
        assert!(validate_threshold(0, 5).is_err());
        assert!(validate_threshold(6, 5).is_err());
        assert_eq!(
            validate_threshold(1, 0).unwrap_err().reason(),
            ErrorReason::MalformedRedeemScript
        );
    }
}
