//! Federation redeem scripts
//!
//! This module provides:
//! - Standard multisig and ERP redeem script builders
//! - Parsing of the supported script layouts
//! - Flyover (fast-bridge) derived scripts
//! - Validation rules every built script passes

pub mod builder;
pub mod flyover;
pub mod non_standard;
pub mod parser;
pub mod validation;

pub use builder::{
    create_multisig_redeem_script, encode_csv_signed_le, encode_csv_unsigned_be,
    majority_threshold, ErpRedeemScriptBuilder, P2shErpRedeemScriptBuilder,
};
pub use flyover::{
    create_flyover_erp_redeem_script, create_flyover_redeem_script, derive_flyover_redeem_script,
    strip_flyover_prefix, DerivationArgumentsHash,
};
pub use non_standard::{
    NonStandardErpRedeemScriptBuilder, NonStandardErpRedeemScriptBuilderHardcoded,
    NonStandardErpRedeemScriptBuilderWithCsvUnsignedBe,
};
pub use parser::{
    extract_standard_redeem_script, parse_erp_redeem_script, parse_multisig, ErpScriptLayout,
    ErpScriptParts, MultisigScript,
};
pub use validation::{
    validate_script_size, validate_timelock, RedeemScriptError, MAX_CSV_VALUE,
    MAX_SCRIPT_ELEMENT_SIZE,
};
