//! Network configuration
//!
//! Consensus rule activation heights and per-network federation constants.

pub mod activation;
pub mod constants;

use std::io;
use thiserror::Error;

use crate::crypto::KeyError;
use crate::error::ErrorReason;

pub use activation::{ActivationConfig, ActivationSource, ActivationsForBlock, ConsensusRule};
pub use constants::FederationConstants;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid key: {0}")]
    KeyError(#[from] KeyError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn reason(&self) -> ErrorReason {
        ErrorReason::InvalidConfiguration
    }
}
