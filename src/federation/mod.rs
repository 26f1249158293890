//! Federations
//!
//! This module provides:
//! - Federation members and the immutable `Federation` entity
//! - Format versions and redeem script builder selection
//! - Pending federations assembled during an election

pub mod factory;
pub mod federation;
pub mod member;
pub mod pending;

pub use factory::{
    build_federation, select_erp_builder, select_federation_format,
    select_non_standard_builder, ErpBuilderKind, FederationFormatVersion,
};
pub use federation::{
    ErpParameters, Federation, FederationArgs, FederationError, FederationKind,
    MIN_FEDERATION_SIZE,
};
pub use member::{FederationMember, KeyType};
pub use pending::PendingFederation;
