//! Thin CLI entrypoint: parse flags, initialize logging, dispatch to a
//! subcommand, and convert the library's [`spot::Error`] into
//! [`anyhow::Error`] only here, at the process boundary (spec §7 "Rust
//! error mapping").

use anyhow::Result;
use clap::Parser;
use spot::cli::{Cli, Commands};
use spot::telemetry::{self, LogLevel, LoggingConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: LogLevel::from_flags(cli.verbose, cli.debug),
        ansi_colors: !cli.no_color,
        ..Default::default()
    };
    telemetry::init(&logging)?;

    let exit_code = match &cli.command {
        Commands::Run(args) => args.execute().await,
        Commands::Inventory(args) => args.execute().await,
        Commands::Vault(args) => args.execute().await,
    };

    match exit_code {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("spot: {err}");
            std::process::exit(1);
        }
    }
}
