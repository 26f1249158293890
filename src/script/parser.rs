//! Redeem script parsing
//!
//! Recognizes the three shapes of redeem script a federation can own:
//!
//! ```text
//! standard:      M <keys> N CHECKMULTISIG
//! non-standard:  NOTIF M <keys> N ELSE <csv> CSV DROP M' <keys'> N' ENDIF CHECKMULTISIG
//! p2sh erp:      NOTIF M <keys> N CHECKMULTISIG ELSE <csv> CSV DROP M' <keys'> N' CHECKMULTISIG ENDIF
//! ```

use bitcoin::opcodes::all::{
    OP_CHECKMULTISIG, OP_CSV, OP_DROP, OP_ELSE, OP_ENDIF, OP_NOTIF, OP_PUSHNUM_1, OP_PUSHNUM_16,
    OP_PUSHNUM_NEG1,
};
use bitcoin::script::{Builder, Instruction, Script, ScriptBuf};
use secp256k1::PublicKey;

use super::builder::create_multisig_redeem_script;
use super::validation::RedeemScriptError;

/// A parsed `M <keys> N CHECKMULTISIG` script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisigScript {
    pub threshold: usize,
    pub public_keys: Vec<PublicKey>,
}

/// Where the CHECKMULTISIG opcodes sit in an ERP script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErpScriptLayout {
    /// One CHECKMULTISIG after ENDIF, shared by both branches
    NonStandard,
    /// Each branch ends in its own CHECKMULTISIG
    P2sh,
}

/// The pieces of an ERP redeem script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErpScriptParts {
    pub layout: ErpScriptLayout,
    pub default_multisig: MultisigScript,
    /// Raw CSV push, kept as-is since its encoding depends on the builder
    pub csv_bytes: Vec<u8>,
    pub emergency_multisig: MultisigScript,
}

pub(crate) fn instructions(script: &Script) -> Result<Vec<Instruction<'_>>, RedeemScriptError> {
    script
        .instructions()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RedeemScriptError::malformed(format!("unparsable script: {}", e)))
}

/// Decode a minimally encoded script number of at most 4 bytes
pub fn decode_script_number(bytes: &[u8]) -> Option<i64> {
    if bytes.len() > 4 {
        return None;
    }
    let last = match bytes.last() {
        Some(last) => *last,
        None => return Some(0),
    };
    let mut value: i64 = 0;
    for (i, byte) in bytes.iter().enumerate() {
        value |= i64::from(*byte) << (8 * i);
    }
    if last & 0x80 != 0 {
        value &= !(0x80_i64 << (8 * (bytes.len() - 1)));
        value = -value;
    }
    Some(value)
}

fn decode_number(instruction: &Instruction<'_>) -> Option<i64> {
    match instruction {
        Instruction::Op(op) => {
            let code = op.to_u8();
            if (OP_PUSHNUM_1.to_u8()..=OP_PUSHNUM_16.to_u8()).contains(&code) {
                Some(i64::from(code - OP_PUSHNUM_1.to_u8()) + 1)
            } else if *op == OP_PUSHNUM_NEG1 {
                Some(-1)
            } else {
                None
            }
        }
        Instruction::PushBytes(bytes) => decode_script_number(bytes.as_bytes()),
    }
}

fn is_op(instruction: &Instruction<'_>, opcode: bitcoin::opcodes::Opcode) -> bool {
    matches!(instruction, Instruction::Op(op) if *op == opcode)
}

/// Parse `M <keys> N` (without the trailing CHECKMULTISIG)
fn parse_multisig_body(body: &[Instruction<'_>]) -> Result<MultisigScript, RedeemScriptError> {
    let (first, rest) = body
        .split_first()
        .ok_or_else(|| RedeemScriptError::malformed("empty multisig"))?;
    let (last, keys) = rest
        .split_last()
        .ok_or_else(|| RedeemScriptError::malformed("multisig without keys"))?;

    let threshold = decode_number(first)
        .ok_or_else(|| RedeemScriptError::malformed("missing threshold"))?;
    let declared_keys =
        decode_number(last).ok_or_else(|| RedeemScriptError::malformed("missing keys count"))?;

    let public_keys = keys
        .iter()
        .map(|instruction| match instruction {
            Instruction::PushBytes(bytes) => PublicKey::from_slice(bytes.as_bytes())
                .map_err(|e| RedeemScriptError::malformed(format!("invalid public key: {}", e))),
            Instruction::Op(op) => Err(RedeemScriptError::malformed(format!(
                "unexpected opcode {} among keys",
                op
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if threshold < 1 {
        return Err(RedeemScriptError::malformed(format!(
            "threshold must be positive, got {}",
            threshold
        )));
    }
    if declared_keys != public_keys.len() as i64 {
        return Err(RedeemScriptError::malformed(format!(
            "declares {} keys but contains {}",
            declared_keys,
            public_keys.len()
        )));
    }
    if threshold > declared_keys {
        return Err(RedeemScriptError::malformed(format!(
            "threshold {} exceeds {} keys",
            threshold, declared_keys
        )));
    }

    Ok(MultisigScript {
        threshold: threshold as usize,
        public_keys,
    })
}

/// Split off a trailing CHECKMULTISIG, failing if it is missing
fn strip_checkmultisig<'a, 'b>(
    instructions: &'a [Instruction<'b>],
) -> Result<&'a [Instruction<'b>], RedeemScriptError> {
    match instructions.split_last() {
        Some((last, body)) if is_op(last, OP_CHECKMULTISIG) => Ok(body),
        _ => Err(RedeemScriptError::malformed("missing OP_CHECKMULTISIG")),
    }
}

/// Parse a standard `M <keys> N CHECKMULTISIG` script
pub fn parse_multisig(script: &Script) -> Result<MultisigScript, RedeemScriptError> {
    let instructions = instructions(script)?;
    parse_multisig_body(strip_checkmultisig(&instructions)?)
}

/// Parse an ERP redeem script in either layout
pub fn parse_erp_redeem_script(script: &Script) -> Result<ErpScriptParts, RedeemScriptError> {
    let instructions = instructions(script)?;
    parse_erp_instructions(&instructions)
}

pub(crate) fn parse_erp_instructions(
    instructions: &[Instruction<'_>],
) -> Result<ErpScriptParts, RedeemScriptError> {
    match instructions.first() {
        Some(first) if is_op(first, OP_NOTIF) => {}
        _ => return Err(RedeemScriptError::malformed("ERP script must start with OP_NOTIF")),
    }
    let else_index = instructions
        .iter()
        .position(|i| is_op(i, OP_ELSE))
        .ok_or_else(|| RedeemScriptError::malformed("missing OP_ELSE"))?;
    let endif_index = instructions
        .iter()
        .position(|i| is_op(i, OP_ENDIF))
        .ok_or_else(|| RedeemScriptError::malformed("missing OP_ENDIF"))?;
    if endif_index < else_index + 4 {
        return Err(RedeemScriptError::malformed("emergency branch is truncated"));
    }

    let csv_bytes = match &instructions[else_index + 1..else_index + 4] {
        [Instruction::PushBytes(csv), csv_op, drop_op]
            if is_op(csv_op, OP_CSV) && is_op(drop_op, OP_DROP) =>
        {
            csv.as_bytes().to_vec()
        }
        _ => {
            return Err(RedeemScriptError::malformed(
                "emergency branch must start with <csv> OP_CSV OP_DROP",
            ))
        }
    };

    let default_branch = &instructions[1..else_index];
    let emergency_branch = &instructions[else_index + 4..endif_index];
    let tail = &instructions[endif_index + 1..];

    let (layout, default_multisig, emergency_multisig) = match tail {
        [last] if is_op(last, OP_CHECKMULTISIG) => (
            ErpScriptLayout::NonStandard,
            parse_multisig_body(default_branch)?,
            parse_multisig_body(emergency_branch)?,
        ),
        [] => (
            ErpScriptLayout::P2sh,
            parse_multisig_body(strip_checkmultisig(default_branch)?)?,
            parse_multisig_body(strip_checkmultisig(emergency_branch)?)?,
        ),
        _ => return Err(RedeemScriptError::malformed("unexpected data after OP_ENDIF")),
    };

    Ok(ErpScriptParts {
        layout,
        default_multisig,
        csv_bytes,
        emergency_multisig,
    })
}

/// Extract the standard multisig a redeem script falls back to in normal
/// operation: the script itself when it is already a plain multisig, or
/// the default branch of an ERP script.
pub fn extract_standard_redeem_script(script: &Script) -> Result<ScriptBuf, RedeemScriptError> {
    if parse_multisig(script).is_ok() {
        return Ok(script.to_owned());
    }
    let parts = parse_erp_redeem_script(script)?;
    create_multisig_redeem_script(
        &parts.default_multisig.public_keys,
        parts.default_multisig.threshold,
    )
}

/// Re-emit parsed instructions onto a builder
pub(crate) fn append_instructions(mut builder: Builder, instructions: &[Instruction<'_>]) -> Builder {
    for instruction in instructions {
        builder = match instruction {
            Instruction::Op(op) => builder.push_opcode(*op),
            Instruction::PushBytes(bytes) => builder.push_slice(*bytes),
        };
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn keys(prefix: &str, count: usize) -> Vec<PublicKey> {
        (0..count)
            .map(|i| KeyPair::from_seed(&format!("{}{}", prefix, i)).unwrap().public_key)
            .collect()
    }

    fn bitcoin_key(key: &PublicKey) -> bitcoin::PublicKey {
        bitcoin::PublicKey::new(*key)
    }

    #[test]
    fn test_decode_script_number() {
        assert_eq!(decode_script_number(&[]), Some(0));
        assert_eq!(decode_script_number(&[0x14]), Some(20));
        assert_eq!(decode_script_number(&[0x50, 0xcd, 0x00]), Some(52_560));
        assert_eq!(decode_script_number(&[0x81]), Some(-1));
        assert_eq!(decode_script_number(&[0xe4, 0x80]), Some(-228));
        assert_eq!(decode_script_number(&[0; 5]), None);
    }

    #[test]
    fn test_parse_multisig() {
        let keys = keys("parse", 5);
        let script = create_multisig_redeem_script(&keys, 3).unwrap();
        let parsed = parse_multisig(&script).unwrap();

        assert_eq!(parsed.threshold, 3);
        assert_eq!(parsed.public_keys, keys);
    }

    #[test]
    fn test_multisig_without_threshold_is_malformed() {
        let keys = keys("malformed", 3);
        let mut builder = Builder::new();
        for key in &keys {
            builder = builder.push_key(&bitcoin_key(key));
        }
        let script = builder
            .push_int(3)
            .push_opcode(OP_CHECKMULTISIG)
            .into_script();

        assert!(matches!(
            parse_multisig(&script),
            Err(RedeemScriptError::MalformedRedeemScript(_))
        ));
    }

    #[test]
    fn test_multisig_with_zero_threshold_is_malformed() {
        let keys = keys("malformed", 3);
        let mut builder = Builder::new().push_int(0);
        for key in &keys {
            builder = builder.push_key(&bitcoin_key(key));
        }
        let script = builder
            .push_int(3)
            .push_opcode(OP_CHECKMULTISIG)
            .into_script();

        assert!(parse_multisig(&script).is_err());
    }

    #[test]
    fn test_multisig_without_keys_count_is_malformed() {
        let keys = keys("malformed", 3);
        let mut builder = Builder::new().push_int(2);
        for key in &keys {
            builder = builder.push_key(&bitcoin_key(key));
        }
        let script = builder.push_opcode(OP_CHECKMULTISIG).into_script();

        assert!(parse_multisig(&script).is_err());
    }

    #[test]
    fn test_multisig_without_checkmultisig_is_malformed() {
        let keys = keys("malformed", 3);
        let mut builder = Builder::new().push_int(2);
        for key in &keys {
            builder = builder.push_key(&bitcoin_key(key));
        }
        let script = builder.push_int(3).into_script();

        assert!(parse_multisig(&script).is_err());
    }

    #[test]
    fn test_standard_script_extracts_to_itself() {
        let keys = keys("standard", 4);
        let script = create_multisig_redeem_script(&keys, 3).unwrap();

        assert_eq!(extract_standard_redeem_script(&script).unwrap(), script);
    }

    #[test]
    fn test_garbage_is_not_an_erp_script() {
        let script = ScriptBuf::from_bytes(vec![0x51, 0x52, 0x53]);
        assert!(parse_erp_redeem_script(&script).is_err());
        assert!(extract_standard_redeem_script(&script).is_err());
    }
}
