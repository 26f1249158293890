//! Bridge Federation CLI Application
//!
//! A command-line interface for inspecting federation scripts, builder
//! selection and vote quorums.

use bitcoin::Network;
use bridge_federation::cli::{self, AppContext};
use bridge_federation::vote::QuorumRule;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bridge-federation")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Federation redeem script diagnostics for a Bitcoin peg", long_about = None)]
struct Cli {
    /// Bitcoin network the federation lives on
    #[arg(short, long, value_enum, default_value = "mainnet")]
    network: NetworkArg,

    /// JSON file replacing the network's federation constants
    #[arg(long)]
    constants: Option<PathBuf>,

    /// JSON file replacing the network's activation heights
    #[arg(long)]
    activations: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the redeem script, P2SH script and address of a federation
    RedeemScript {
        /// Federation JSON file; defaults to the genesis federation
        #[arg(short, long)]
        federation: Option<PathBuf>,
    },

    /// Show which builder a federation created at a height would use
    SelectBuilder {
        /// Creation block height
        #[arg(long)]
        height: u64,
    },

    /// Show how many votes an administrative change needs
    RequiredVotes {
        /// Quorum rule
        #[arg(short, long, value_enum, default_value = "majority")]
        rule: RuleArg,

        /// Number of authorized voters; defaults to the network's
        /// federation change authorizers
        #[arg(short, long)]
        identities: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum NetworkArg {
    Mainnet,
    Testnet,
    Regtest,
}

impl From<NetworkArg> for Network {
    fn from(arg: NetworkArg) -> Self {
        match arg {
            NetworkArg::Mainnet => Network::Bitcoin,
            NetworkArg::Testnet => Network::Testnet,
            NetworkArg::Regtest => Network::Regtest,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RuleArg {
    One,
    Majority,
    All,
}

impl From<RuleArg> for QuorumRule {
    fn from(arg: RuleArg) -> Self {
        match arg {
            RuleArg::One => QuorumRule::One,
            RuleArg::Majority => QuorumRule::Majority,
            RuleArg::All => QuorumRule::All,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let context = AppContext::load(
        cli.network.into(),
        cli.constants.as_deref(),
        cli.activations.as_deref(),
    )?;

    match cli.command {
        Commands::RedeemScript { federation } => {
            cli::cmd_redeem_script(&context, federation.as_deref())?;
        }

        Commands::SelectBuilder { height } => {
            cli::cmd_select_builder(&context, height)?;
        }

        Commands::RequiredVotes { rule, identities } => {
            cli::cmd_required_votes(&context, rule.into(), identities)?;
        }
    }

    Ok(())
}
