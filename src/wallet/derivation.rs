//! Flyover derivation records and where to find them
//!
//! A derivation record ties a flyover script hash back to the federation it
//! was derived from and the arguments hash baked into its prefix.

use bitcoin::script::ScriptBuf;
use bitcoin::ScriptHash;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::federation::{Federation, FederationKind};
use crate::script::{
    create_flyover_erp_redeem_script, create_flyover_redeem_script, DerivationArgumentsHash,
    RedeemScriptError,
};
use crate::storage::{FederationStorageProvider, StorageAccessor, StorageError};

/// Record of one flyover derivation, keyed by the derived script hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationRecord {
    derivation_arguments_hash: DerivationArgumentsHash,
    target_federation_redeem_script_hash: ScriptHash,
}

impl DerivationRecord {
    pub fn new(
        derivation_arguments_hash: DerivationArgumentsHash,
        target_federation_redeem_script_hash: ScriptHash,
    ) -> Self {
        Self {
            derivation_arguments_hash,
            target_federation_redeem_script_hash,
        }
    }

    /// Record targeting the given federation
    pub fn for_federation(
        derivation_arguments_hash: DerivationArgumentsHash,
        federation: &Federation,
    ) -> Self {
        Self::new(derivation_arguments_hash, federation.redeem_script_hash())
    }

    pub fn derivation_arguments_hash(&self) -> &DerivationArgumentsHash {
        &self.derivation_arguments_hash
    }

    pub fn target_federation_redeem_script_hash(&self) -> &ScriptHash {
        &self.target_federation_redeem_script_hash
    }
}

/// Flyover redeem script of a federation for a given derivation hash
pub fn flyover_redeem_script(
    federation: &Federation,
    derivation_arguments_hash: &DerivationArgumentsHash,
) -> Result<ScriptBuf, RedeemScriptError> {
    match federation.kind() {
        FederationKind::StandardMultisig => {
            create_flyover_redeem_script(federation.redeem_script(), derivation_arguments_hash)
        }
        FederationKind::Erp(_) => {
            create_flyover_erp_redeem_script(federation.redeem_script(), derivation_arguments_hash)
        }
    }
}

// =============================================================================
// Derivation sources
// =============================================================================

/// Looks up derivation records by derived script hash
pub trait DerivationSource {
    fn find_derivation(
        &self,
        derived_script_hash: &ScriptHash,
    ) -> Result<Option<DerivationRecord>, StorageError>;
}

/// Source for wallets that never watch flyover scripts
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDerivations;

impl DerivationSource for NoDerivations {
    fn find_derivation(&self, _: &ScriptHash) -> Result<Option<DerivationRecord>, StorageError> {
        Ok(None)
    }
}

/// Source holding exactly one derivation
#[derive(Debug, Clone)]
pub struct SingleDerivation {
    derived_script_hash: ScriptHash,
    record: DerivationRecord,
}

impl SingleDerivation {
    pub fn new(derived_script_hash: ScriptHash, record: DerivationRecord) -> Self {
        Self {
            derived_script_hash,
            record,
        }
    }
}

impl DerivationSource for SingleDerivation {
    fn find_derivation(
        &self,
        derived_script_hash: &ScriptHash,
    ) -> Result<Option<DerivationRecord>, StorageError> {
        if derived_script_hash == &self.derived_script_hash {
            Ok(Some(self.record.clone()))
        } else {
            Ok(None)
        }
    }
}

/// Source backed by a map
#[derive(Debug, Clone, Default)]
pub struct InMemoryDerivations {
    records: HashMap<ScriptHash, DerivationRecord>,
}

impl InMemoryDerivations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, derived_script_hash: ScriptHash, record: DerivationRecord) {
        self.records.insert(derived_script_hash, record);
    }

    /// Derive the flyover script of `federation` and record it, returning
    /// the derived script hash
    pub fn register(
        &mut self,
        federation: &Federation,
        derivation_arguments_hash: DerivationArgumentsHash,
    ) -> Result<ScriptHash, RedeemScriptError> {
        let derived = flyover_redeem_script(federation, &derivation_arguments_hash)?;
        let derived_script_hash = derived.script_hash();
        self.insert(
            derived_script_hash,
            DerivationRecord::for_federation(derivation_arguments_hash, federation),
        );
        Ok(derived_script_hash)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl DerivationSource for InMemoryDerivations {
    fn find_derivation(
        &self,
        derived_script_hash: &ScriptHash,
    ) -> Result<Option<DerivationRecord>, StorageError> {
        Ok(self.records.get(derived_script_hash).cloned())
    }
}

/// Source reading records persisted by a storage provider
pub struct StorageDerivations<'a, S: StorageAccessor> {
    provider: &'a FederationStorageProvider<S>,
}

impl<'a, S: StorageAccessor> StorageDerivations<'a, S> {
    pub fn new(provider: &'a FederationStorageProvider<S>) -> Self {
        Self { provider }
    }
}

impl<S: StorageAccessor> DerivationSource for StorageDerivations<'_, S> {
    fn find_derivation(
        &self,
        derived_script_hash: &ScriptHash,
    ) -> Result<Option<DerivationRecord>, StorageError> {
        self.provider.flyover_derivation(derived_script_hash)
    }
}
