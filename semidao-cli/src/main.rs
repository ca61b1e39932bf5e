//! Semidao CLI - collect bills from the Semidao customer portal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

use commands::{bills, config, logs, run};

/// Semidao - fetch bills from the customer portal and link them to bank operations
#[derive(Parser)]
#[command(name = "semidao", version, about, long_about = None)]
struct Cli {
    /// Log verbosity (overridden by SEMIDAO_LOG or RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, fetch the bill table and store new bills
    Run {
        /// Portal account email
        #[arg(long, env = "SEMIDAO_EMAIL")]
        email: Option<String>,
        /// Extract and dedup without storing or linking anything
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored bills
    Bills {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },

    /// View and manage the run log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env("SEMIDAO_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    // Diagnostics go to stderr so `--json` output stays parseable
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match dispatch(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run { email, dry_run, json } => run::run(email, dry_run, json),
        Commands::Bills { json } => bills::run(json),
        Commands::Config { command } => config::run(command),
        Commands::Logs { command } => logs::run(command),
    }
}
