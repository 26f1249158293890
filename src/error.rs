//! Stable error reason codes shared by all federation errors
//!
//! Each module keeps its own `thiserror` enum; every variant maps to one of
//! these reasons so callers can branch on the kind of failure without
//! matching message strings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable reason attached to every federation error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorReason {
    /// CSV timelock outside `[1, 65535]`
    InvalidTimelock,
    /// ERP federation without emergency keys
    EmptyEmergencyKeySet,
    /// Redeem script larger than the maximum script element size
    ScriptTooLarge,
    /// Multisig threshold outside `[1, keys]`
    InvalidThreshold,
    /// Multisig script that does not parse as `M keys N CHECKMULTISIG`
    MalformedRedeemScript,
    /// Federation with no members
    EmptyMembers,
    /// Two members share the same Bitcoin public key
    DuplicateMember,
    /// Pending federation not ready to be committed
    IncompleteFederation,
    /// Stored federation tagged with a version nobody knows how to decode
    UnknownFederationFormatVersion,
    /// Derivation record pointing at a federation that is not known
    OrphanDerivationRecord,
    /// Stored bytes that cannot be decoded
    CorruptStorage,
    /// Backend or I/O failure
    StorageUnavailable,
    /// Invalid or unreadable configuration
    InvalidConfiguration,
    /// Vote authorizer with nobody authorized
    EmptyAuthorizedSet,
}

impl ErrorReason {
    /// Stable string code for logs and RPC responses
    pub fn code(&self) -> &'static str {
        match self {
            ErrorReason::InvalidTimelock => "INVALID_TIMELOCK",
            ErrorReason::EmptyEmergencyKeySet => "EMPTY_EMERGENCY_KEY_SET",
            ErrorReason::ScriptTooLarge => "SCRIPT_TOO_LARGE",
            ErrorReason::InvalidThreshold => "INVALID_THRESHOLD",
            ErrorReason::MalformedRedeemScript => "MALFORMED_REDEEM_SCRIPT",
            ErrorReason::EmptyMembers => "EMPTY_MEMBERS",
            ErrorReason::DuplicateMember => "DUPLICATE_MEMBER",
            ErrorReason::IncompleteFederation => "INCOMPLETE_FEDERATION",
            ErrorReason::UnknownFederationFormatVersion => "UNKNOWN_FEDERATION_FORMAT_VERSION",
            ErrorReason::OrphanDerivationRecord => "ORPHAN_DERIVATION_RECORD",
            ErrorReason::CorruptStorage => "CORRUPT_STORAGE",
            ErrorReason::StorageUnavailable => "STORAGE_UNAVAILABLE",
            ErrorReason::InvalidConfiguration => "INVALID_CONFIGURATION",
            ErrorReason::EmptyAuthorizedSet => "EMPTY_AUTHORIZED_SET",
        }
    }

    /// True for faults in persisted state, as opposed to bad caller input
    ///
    /// Integrity faults mean the node's own data is inconsistent and should
    /// be surfaced loudly rather than retried.
    pub fn is_integrity_fault(&self) -> bool {
        matches!(
            self,
            ErrorReason::UnknownFederationFormatVersion
                | ErrorReason::OrphanDerivationRecord
                | ErrorReason::CorruptStorage
        )
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
