//! Federation state persistence
//!
//! Federations are stored as their members and creation data next to a
//! format version tag. Scripts are never stored: on load the tag and the
//! activations at the creation height pick the builder again.

use bitcoin::ScriptHash;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::accessor::{StorageAccessor, StorageError};
use crate::config::{ActivationConfig, FederationConstants};
use crate::federation::{
    build_federation, Federation, FederationArgs, FederationFormatVersion, FederationMember,
    PendingFederation,
};
use crate::wallet::DerivationRecord;

/// Storage slots used by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKey {
    NewFederation,
    OldFederation,
    PendingFederation,
    NewFederationFormatVersion,
    OldFederationFormatVersion,
    FlyoverDerivation(ScriptHash),
}

impl StorageKey {
    pub fn as_key(&self) -> String {
        match self {
            StorageKey::NewFederation => "new_federation".to_string(),
            StorageKey::OldFederation => "old_federation".to_string(),
            StorageKey::PendingFederation => "pending_federation".to_string(),
            StorageKey::NewFederationFormatVersion => "new_federation_format_version".to_string(),
            StorageKey::OldFederationFormatVersion => "old_federation_format_version".to_string(),
            StorageKey::FlyoverDerivation(hash) => format!("flyover_derivations/{}", hash),
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

/// What actually goes to storage for a federation
#[derive(Debug, Serialize, Deserialize)]
struct StoredFederation {
    members: Vec<FederationMember>,
    creation_time: DateTime<Utc>,
    creation_block_number: u64,
}

impl From<&Federation> for StoredFederation {
    fn from(federation: &Federation) -> Self {
        Self {
            members: federation.members().to_vec(),
            creation_time: federation.creation_time(),
            creation_block_number: federation.creation_block_number(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    New,
    Old,
}

impl Slot {
    fn federation_key(self) -> StorageKey {
        match self {
            Slot::New => StorageKey::NewFederation,
            Slot::Old => StorageKey::OldFederation,
        }
    }

    fn version_key(self) -> StorageKey {
        match self {
            Slot::New => StorageKey::NewFederationFormatVersion,
            Slot::Old => StorageKey::OldFederationFormatVersion,
        }
    }
}

// =============================================================================
// Provider
// =============================================================================

/// Reads and writes federation state through a storage accessor
pub struct FederationStorageProvider<S: StorageAccessor> {
    accessor: S,
    constants: FederationConstants,
    activation_config: ActivationConfig,
}

impl<S: StorageAccessor> FederationStorageProvider<S> {
    pub fn new(accessor: S, constants: FederationConstants, activation_config: ActivationConfig) -> Self {
        Self {
            accessor,
            constants,
            activation_config,
        }
    }

    pub fn accessor(&self) -> &S {
        &self.accessor
    }

    pub fn constants(&self) -> &FederationConstants {
        &self.constants
    }

    /// The active federation
    pub fn new_federation(&self) -> Result<Option<Federation>, StorageError> {
        self.load_federation(Slot::New)
    }

    pub fn set_new_federation(&self, federation: Option<&Federation>) -> Result<(), StorageError> {
        self.save_federation(Slot::New, federation)
    }

    /// The retiring federation, if a handover is in progress
    pub fn old_federation(&self) -> Result<Option<Federation>, StorageError> {
        self.load_federation(Slot::Old)
    }

    pub fn set_old_federation(&self, federation: Option<&Federation>) -> Result<(), StorageError> {
        self.save_federation(Slot::Old, federation)
    }

    pub fn pending_federation(&self) -> Result<Option<PendingFederation>, StorageError> {
        match self.accessor.get(&StorageKey::PendingFederation.as_key())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn set_pending_federation(&self, pending: &PendingFederation) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(pending)?;
        self.accessor.put(&StorageKey::PendingFederation.as_key(), bytes)
    }

    pub fn clear_pending_federation(&self) -> Result<(), StorageError> {
        self.accessor.delete(&StorageKey::PendingFederation.as_key())
    }

    /// Derivation record stored for a flyover script hash
    pub fn flyover_derivation(
        &self,
        derived_script_hash: &ScriptHash,
    ) -> Result<Option<DerivationRecord>, StorageError> {
        let key = StorageKey::FlyoverDerivation(*derived_script_hash).as_key();
        match self.accessor.get(&key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn save_flyover_derivation(
        &self,
        derived_script_hash: &ScriptHash,
        record: &DerivationRecord,
    ) -> Result<(), StorageError> {
        let key = StorageKey::FlyoverDerivation(*derived_script_hash).as_key();
        debug!("Saving flyover derivation {}", key);
        self.accessor.put(&key, serde_json::to_vec(record)?)
    }

    // -------------------------------------------------------------------------
    // Federation slots
    // -------------------------------------------------------------------------

    fn load_federation(&self, slot: Slot) -> Result<Option<Federation>, StorageError> {
        let bytes = match self.accessor.get(&slot.federation_key().as_key())? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let stored: StoredFederation = serde_json::from_slice(&bytes)?;

        // Federations stored before versioning have no tag
        let format = match self.accessor.get(&slot.version_key().as_key())? {
            Some(tag) => FederationFormatVersion::try_from(serde_json::from_slice::<u32>(&tag)?)?,
            None => FederationFormatVersion::StandardMultisig,
        };

        let activations = self.activation_config.for_block(stored.creation_block_number);
        let args = FederationArgs::new(
            stored.members,
            stored.creation_time,
            stored.creation_block_number,
            self.constants.network,
        );
        let federation = build_federation(format, args, &self.constants, &activations)?;

        debug!("Loaded {} as {}", federation.address(), slot.federation_key());
        Ok(Some(federation))
    }

    fn save_federation(&self, slot: Slot, federation: Option<&Federation>) -> Result<(), StorageError> {
        let federation_key = slot.federation_key().as_key();
        let version_key = slot.version_key().as_key();

        let federation = match federation {
            Some(federation) => federation,
            None => {
                self.accessor.delete(&federation_key)?;
                return self.accessor.delete(&version_key);
            }
        };

        if federation.network() != self.constants.network {
            return Err(StorageError::InvalidData(format!(
                "federation on {} cannot be stored under {} constants",
                federation.network(),
                self.constants.network
            )));
        }

        let stored = StoredFederation::from(federation);
        self.accessor.put(&federation_key, serde_json::to_vec(&stored)?)?;
        self.accessor.put(
            &version_key,
            serde_json::to_vec(&federation.format_version().as_u32())?,
        )?;

        info!(
            "Stored {} as {} (format {})",
            federation.address(),
            federation_key,
            federation.format_version()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsensusRule;
    use crate::crypto::KeyPair;
    use crate::error::ErrorReason;
    use crate::federation::{ErpBuilderKind, FederationError};
    use crate::script::DerivationArgumentsHash;
    use crate::storage::InMemoryStorage;
    use bitcoin::hashes::Hash;
    use bitcoin::Network;
    use chrono::TimeZone;

    fn schedule() -> ActivationConfig {
        ActivationConfig::default()
            .with_rule(ConsensusRule::ErpFederations, 100)
            .with_rule(ConsensusRule::CsvSignedLittleEndian, 100)
            .with_rule(ConsensusRule::P2shErpFederations, 200)
    }

    fn provider() -> FederationStorageProvider<InMemoryStorage> {
        FederationStorageProvider::new(
            InMemoryStorage::new(),
            FederationConstants::regtest().unwrap(),
            schedule(),
        )
    }

    fn pending() -> PendingFederation {
        PendingFederation::new(
            (0..4)
                .map(|i| {
                    FederationMember::from_btc_public_key(
                        KeyPair::from_seed(&format!("stored{}", i)).unwrap().public_key,
                    )
                })
                .collect(),
        )
    }

    fn federation_at(block: u64) -> Federation {
        let provider = provider();
        pending()
            .build_federation(
                Utc.timestamp_opt(1_650_000_000, 0).unwrap(),
                block,
                provider.constants(),
                &schedule().for_block(block),
            )
            .unwrap()
    }

    #[test]
    fn test_storage_keys() {
        assert_eq!(StorageKey::NewFederation.as_key(), "new_federation");
        assert_eq!(
            StorageKey::OldFederationFormatVersion.as_key(),
            "old_federation_format_version"
        );
        let hash = ScriptHash::from_byte_array([0xab; 20]);
        assert_eq!(
            StorageKey::FlyoverDerivation(hash).as_key(),
            format!("flyover_derivations/{}", "ab".repeat(20))
        );
    }

    #[test]
    fn test_empty_storage() {
        let provider = provider();
        assert!(provider.new_federation().unwrap().is_none());
        assert!(provider.old_federation().unwrap().is_none());
        assert!(provider.pending_federation().unwrap().is_none());
    }

    #[test]
    fn test_federation_round_trip_per_format() {
        let provider = provider();

        for block in [50, 150, 250] {
            let federation = federation_at(block);
            provider.set_new_federation(Some(&federation)).unwrap();
            let loaded = provider.new_federation().unwrap().unwrap();

            assert_eq!(loaded, federation);
            assert_eq!(loaded.format_version(), federation.format_version());
            assert_eq!(loaded.address(), federation.address());
        }
    }

    #[test]
    fn test_old_and_new_slots_are_independent() {
        let provider = provider();
        let old = federation_at(150);
        let new = federation_at(250);

        provider.set_old_federation(Some(&old)).unwrap();
        provider.set_new_federation(Some(&new)).unwrap();
        assert_eq!(provider.old_federation().unwrap().unwrap(), old);
        assert_eq!(provider.new_federation().unwrap().unwrap(), new);

        provider.set_old_federation(None).unwrap();
        assert!(provider.old_federation().unwrap().is_none());
        assert!(provider
            .accessor()
            .get(&StorageKey::OldFederationFormatVersion.as_key())
            .unwrap()
            .is_none());
        assert!(provider.new_federation().unwrap().is_some());
    }

    #[test]
    fn test_missing_version_loads_standard_multisig() {
        let provider = provider();
        let federation = federation_at(250);
        provider.set_new_federation(Some(&federation)).unwrap();
        provider
            .accessor()
            .delete(&StorageKey::NewFederationFormatVersion.as_key())
            .unwrap();

        let loaded = provider.new_federation().unwrap().unwrap();
        assert_eq!(loaded.format_version(), FederationFormatVersion::StandardMultisig);
        assert_eq!(loaded.members(), federation.members());
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let provider = provider();
        provider.set_new_federation(Some(&federation_at(50))).unwrap();
        provider
            .accessor()
            .put(
                &StorageKey::NewFederationFormatVersion.as_key(),
                serde_json::to_vec(&4000u32).unwrap(),
            )
            .unwrap();

        let error = provider.new_federation().unwrap_err();
        assert!(matches!(
            error,
            StorageError::Federation(FederationError::UnknownFederationFormatVersion(4000))
        ));
        assert_eq!(error.reason(), ErrorReason::UnknownFederationFormatVersion);
        assert!(error.reason().is_integrity_fault());
    }

    #[test]
    fn test_builder_follows_creation_height() {
        let constants = FederationConstants::regtest().unwrap();
        // CSV encoding activates after the federation was created
        let late_csv = ActivationConfig::default()
            .with_rule(ConsensusRule::ErpFederations, 100)
            .with_rule(ConsensusRule::CsvSignedLittleEndian, 1_000);
        let federation = pending()
            .build_federation(
                Utc.timestamp_opt(1_650_000_000, 0).unwrap(),
                150,
                &constants,
                &late_csv.for_block(150),
            )
            .unwrap();
        let provider = FederationStorageProvider::new(InMemoryStorage::new(), constants, late_csv);

        provider.set_new_federation(Some(&federation)).unwrap();
        let loaded = provider.new_federation().unwrap().unwrap();
        assert_eq!(
            loaded.erp_parameters().unwrap().builder(),
            ErpBuilderKind::NonStandardCsvUnsignedBe
        );
        assert_eq!(loaded.redeem_script(), federation.redeem_script());
    }

    #[test]
    fn test_network_mismatch_is_rejected() {
        let provider = FederationStorageProvider::new(
            InMemoryStorage::new(),
            FederationConstants::mainnet().unwrap(),
            ActivationConfig::mainnet(),
        );
        let regtest = federation_at(50);
        assert_eq!(regtest.network(), Network::Regtest);

        let error = provider.set_new_federation(Some(&regtest)).unwrap_err();
        assert!(matches!(error, StorageError::InvalidData(_)));
        assert!(provider.accessor().is_empty());
    }

    #[test]
    fn test_pending_federation_lifecycle() {
        let provider = provider();
        let pending = pending();

        provider.set_pending_federation(&pending).unwrap();
        assert_eq!(provider.pending_federation().unwrap(), Some(pending));

        provider.clear_pending_federation().unwrap();
        assert!(provider.pending_federation().unwrap().is_none());
    }

    #[test]
    fn test_flyover_derivation_round_trip() {
        let provider = provider();
        let federation = federation_at(250);
        let derived = ScriptHash::from_byte_array([7; 20]);
        let record =
            DerivationRecord::for_federation(DerivationArgumentsHash::new([1; 32]), &federation);

        assert!(provider.flyover_derivation(&derived).unwrap().is_none());
        provider.save_flyover_derivation(&derived, &record).unwrap();
        assert_eq!(provider.flyover_derivation(&derived).unwrap(), Some(record));
    }

    #[test]
    fn test_corrupt_federation_entry() {
        let provider = provider();
        provider
            .accessor()
            .put(&StorageKey::NewFederation.as_key(), b"not json".to_vec())
            .unwrap();

        let error = provider.new_federation().unwrap_err();
        assert_eq!(error.reason(), ErrorReason::CorruptStorage);
    }
}
