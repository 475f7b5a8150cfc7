//! regscout command-line shell.
//!
//! Parses arguments, loads configuration, builds [`AppServices`] and runs
//! one subcommand. Core logic lives in the `crates/` directory.

pub mod cli;
pub mod commands;
pub mod services;

pub use services::AppServices;

use clap::Parser;
use cli::{Cli, Command};
use regscout_core::AppConfig;
use std::process::ExitCode;
use tracing::{error, info};

/// Initialize tracing subscriber for logging
///
/// Logs go to stderr so stdout carries only command output.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,regscout=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Run the CLI to completion.
pub async fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();
    info!("Starting regscout v{}", env!("CARGO_PKG_VERSION"));

    match execute(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn execute(cli: Cli) -> anyhow::Result<bool> {
    let config = AppConfig::load_with_env(cli.config.as_deref())?;
    let services = AppServices::init(config).await?;

    let mut stdout = std::io::stdout().lock();
    let outcome = match &cli.command {
        Command::Check(args) => commands::check(&services, args, &mut stdout).await,
        Command::Recheck(args) => commands::recheck(&services, args, &mut stdout).await,
        Command::Providers => commands::providers(&services, &mut stdout),
    };

    services.shutdown().await;
    outcome
}
