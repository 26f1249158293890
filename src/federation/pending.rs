//! Pending federation
//!
//! Members being gathered by an election before the federation is
//! committed. The pending set only becomes a real federation once it has
//! enough members and the activations at the commit height pick its kind.

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use super::factory::{build_federation, select_federation_format};
use super::federation::{Federation, FederationArgs, FederationError, MIN_FEDERATION_SIZE};
use super::member::FederationMember;
use crate::config::{ActivationSource, FederationConstants};
use crate::crypto::keccak256;

/// Ordered members of a federation under construction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFederation {
    members: Vec<FederationMember>,
}

impl PendingFederation {
    pub fn new(members: Vec<FederationMember>) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &[FederationMember] {
        &self.members
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Append a member, rejecting a BTC key already present
    pub fn add_member(&mut self, member: FederationMember) -> Result<(), FederationError> {
        if self
            .members
            .iter()
            .any(|existing| existing.btc_public_key() == member.btc_public_key())
        {
            return Err(FederationError::DuplicateMember(*member.btc_public_key()));
        }
        self.members.push(member);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.members.len() >= MIN_FEDERATION_SIZE
    }

    /// Hash identifying this proposal: keccak256 over the members'
    /// compressed BTC keys in order
    pub fn hash(&self) -> [u8; 32] {
        let serialized: Vec<u8> = self
            .members
            .iter()
            .flat_map(|member| member.btc_public_key().serialize())
            .collect();
        keccak256(&serialized)
    }

    /// Commit the pending members as a federation
    ///
    /// The federation kind follows the activations at `creation_block_number`;
    /// ERP federations take their emergency keys and delay from `constants`.
    pub fn build_federation(
        &self,
        creation_time: DateTime<Utc>,
        creation_block_number: u64,
        constants: &FederationConstants,
        activations: &dyn ActivationSource,
    ) -> Result<Federation, FederationError> {
        if !self.is_complete() {
            return Err(FederationError::IncompleteFederation(self.members.len()));
        }

        let format = select_federation_format(activations);
        let args = FederationArgs::new(
            self.members.clone(),
            creation_time,
            creation_block_number,
            constants.network,
        );
        let federation = build_federation(format, args, constants, activations)?;

        info!(
            "Built federation {} (format {}) from pending federation at block {}",
            federation.address(),
            format,
            creation_block_number
        );
        Ok(federation)
    }
}
