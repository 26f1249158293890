//! Command-line interface

pub mod commands;

pub use commands::{
    cmd_redeem_script, cmd_required_votes, cmd_select_builder, AppContext, CliResult,
    FederationFile,
};
