//! Command-line interface (spec §6 "CLI surface", an external-collaborator
//! concern specified only through the minimal flags the engine consumes).
//! Grounded in the teacher's `cli::Cli`/`Commands` shape, trimmed to the
//! flags spec §6 actually names.

pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "spot")]
#[command(author, version)]
#[command(about = "Concurrent, agent-less SSH configuration and deployment orchestrator")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity to debug.
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Increase log verbosity to trace.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Disable ANSI colors in output and logs.
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a task (or an ad-hoc command) against a target.
    Run(commands::run::RunArgs),

    /// Resolve a target into its Destinations, as JSON or a rendered template.
    Inventory(commands::inventory::InventoryArgs),

    /// Encrypt or decrypt an encrypted-YAML secrets file.
    Vault(commands::vault::VaultArgs),
}
