use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "hawk",
    about = "Issue, inspect and revoke Hawk credentials",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Issue a new credential and print it as JSON.
    Create,
    /// Print the credential stored under an id.
    Get { id: String },
    /// Revoke one credential.
    Delete { id: String },
    /// Revoke several credentials at once.
    DeleteMany {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Round-trip a throwaway credential through the configured store.
    Health,
    /// Print version and exit.
    Version,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}
