use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Check domain availability and pricing across registrars.
#[derive(Debug, Parser)]
#[command(name = "regscout", version)]
pub struct Cli {
    /// Configuration file (defaults to the XDG config dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Query providers now and print the results
    Check(CheckArgs),
    /// Queue background checks and run them to completion
    Recheck(RecheckArgs),
    /// List configured providers
    Providers,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    pub domain: String,

    /// Provider to query; repeat for several (default: all)
    #[arg(long = "provider", short = 'p', value_name = "ID")]
    pub providers: Vec<String>,

    /// Per-provider timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Print results as server-sent events as they arrive
    #[arg(long)]
    pub stream: bool,
}

#[derive(Debug, Args)]
pub struct RecheckArgs {
    pub domain: String,

    #[arg(long = "provider", short = 'p', value_name = "ID")]
    pub providers: Vec<String>,

    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}
