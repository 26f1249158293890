//! Federation wallet script resolution
//!
//! Given the script hash of an output, find the redeem script and keys
//! needed to spend it. Outputs either pay a federation directly or pay a
//! flyover script derived from one.

use bitcoin::script::ScriptBuf;
use bitcoin::ScriptHash;
use log::{debug, warn};
use secp256k1::PublicKey;
use std::sync::Arc;
use thiserror::Error;

use super::derivation::{flyover_redeem_script, DerivationSource, NoDerivations};
use crate::error::ErrorReason;
use crate::federation::Federation;
use crate::script::RedeemScriptError;
use crate::storage::StorageError;

/// Everything a signer needs to spend an output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemData {
    pub public_keys: Vec<PublicKey>,
    pub redeem_script: ScriptBuf,
}

/// Resolution errors
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("Derivation record for {0} targets no known federation")]
    OrphanDerivationRecord(ScriptHash),
    #[error("Script error: {0}")]
    Script(#[from] RedeemScriptError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ResolutionError {
    pub fn reason(&self) -> ErrorReason {
        match self {
            ResolutionError::OrphanDerivationRecord(_) => ErrorReason::OrphanDerivationRecord,
            ResolutionError::Script(e) => e.reason(),
            ResolutionError::Storage(e) => e.reason(),
        }
    }
}

/// Watches the scripts of a set of federations
pub struct FederationWallet<D: DerivationSource = NoDerivations> {
    federations: Vec<Arc<Federation>>,
    derivations: D,
}

impl FederationWallet<NoDerivations> {
    /// Wallet over plain federation scripts only
    pub fn new(federations: Vec<Arc<Federation>>) -> Self {
        Self::with_derivations(federations, NoDerivations)
    }
}

impl<D: DerivationSource> FederationWallet<D> {
    pub fn with_derivations(federations: Vec<Arc<Federation>>, derivations: D) -> Self {
        Self {
            federations,
            derivations,
        }
    }

    pub fn federations(&self) -> &[Arc<Federation>] {
        &self.federations
    }

    /// Script hashes of the federations' own redeem scripts
    pub fn watched_script_hashes(&self) -> Vec<ScriptHash> {
        self.federations
            .iter()
            .map(|federation| federation.redeem_script_hash())
            .collect()
    }

    /// Redeem data for an output paying `script_hash`
    ///
    /// Flyover derivations take precedence over plain federation scripts. A
    /// derivation whose target federation is unknown is an error, never a
    /// silent miss.
    pub fn find_redeem_data_from_script_hash(
        &self,
        script_hash: &ScriptHash,
    ) -> Result<Option<RedeemData>, ResolutionError> {
        if let Some(record) = self.derivations.find_derivation(script_hash)? {
            let target = record.target_federation_redeem_script_hash();
            let federation = match self.federation_by_script_hash(target) {
                Some(federation) => federation,
                None => {
                    warn!(
                        "Flyover derivation {} points at unknown federation script {}",
                        script_hash, target
                    );
                    return Err(ResolutionError::OrphanDerivationRecord(*script_hash));
                }
            };

            let redeem_script =
                flyover_redeem_script(federation, record.derivation_arguments_hash())?;
            debug!(
                "Resolved {} as flyover script of federation {}",
                script_hash,
                federation.address()
            );
            return Ok(Some(RedeemData {
                public_keys: federation.btc_public_keys(),
                redeem_script,
            }));
        }

        match self.federation_by_script_hash(script_hash) {
            Some(federation) => {
                debug!("Resolved {} as federation {}", script_hash, federation.address());
                Ok(Some(RedeemData {
                    public_keys: federation.btc_public_keys(),
                    redeem_script: federation.redeem_script().clone(),
                }))
            }
            None => {
                debug!("No federation script matches {}", script_hash);
                Ok(None)
            }
        }
    }

    fn federation_by_script_hash(&self, script_hash: &ScriptHash) -> Option<&Federation> {
        self.federations
            .iter()
            .map(|federation| federation.as_ref())
            .find(|federation| &federation.redeem_script_hash() == script_hash)
    }
}
