//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

use crate::domain::PartnerId;

/// Referral network engine: partner hierarchy, compression and tiered commissions
#[derive(Parser, Debug)]
#[command(name = "partnet")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Local config file (overrides the global config)
    #[arg(short, long, global = true, env = "PARTNET_CONFIG", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a scenario network, process its purchases and report commissions
    Simulate {
        /// Scenario TOML file
        #[arg(value_hint = ValueHint::FilePath)]
        scenario: PathBuf,
        /// Print outcomes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the upline chain of a partner
    Chain {
        /// Scenario TOML file
        #[arg(value_hint = ValueHint::FilePath)]
        scenario: PathBuf,
        /// Partner id
        partner: PartnerId,
        /// Number of upline levels (default: plan max_levels)
        #[arg(short, long)]
        levels: Option<usize>,
    },

    /// Show the downline tree of a partner
    Tree {
        /// Scenario TOML file
        #[arg(value_hint = ValueHint::FilePath)]
        scenario: PathBuf,
        /// Partner id
        partner: PartnerId,
        /// Limit tree depth
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Commission summary of one partner after processing a scenario (JSON)
    Summary {
        /// Scenario TOML file
        #[arg(value_hint = ValueHint::FilePath)]
        scenario: PathBuf,
        /// Partner id
        partner: PartnerId,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print effective settings as TOML
    Show,
    /// Print global config file location
    Path,
}
