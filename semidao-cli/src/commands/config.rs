//! Config command - show and change settings.json

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use semidao_core::config::Config;

use super::get_data_dir;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the resolved settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change one setting
    Set {
        /// base-url, session-warmup, timeout, user-agent, documents-dir,
        /// min-date-delta, max-date-delta or amount-delta
        key: String,
        value: String,
    },
}

pub fn run(command: ConfigCommands) -> Result<()> {
    let data_dir = get_data_dir()?;

    match command {
        ConfigCommands::Show { json } => {
            let config = Config::load(&data_dir)?;

            if json {
                let value = serde_json::json!({
                    "portal": config.portal,
                    "linking": config.linking,
                    "documentsDir": config.documents_dir,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
                return Ok(());
            }

            println!("{}", "Portal".bold());
            println!("  Base URL: {}", config.portal.base_url);
            println!("  Session warm-up: {:?}", config.portal.session_warmup);
            println!("  Timeout: {}s", config.portal.request_timeout_secs);
            if let Some(agent) = &config.portal.user_agent {
                println!("  User agent: {}", agent);
            }
            println!("{}", "Linking".bold());
            println!(
                "  Window: -{} / +{} days, amount ±{}",
                config.linking.min_date_delta,
                config.linking.max_date_delta,
                config.linking.amount_delta
            );
            println!("Documents: {}", config.documents_dir.display());
        }
        ConfigCommands::Set { key, value } => {
            std::fs::create_dir_all(&data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

            let mut config = Config::load(&data_dir)?;
            config.set(&key, &value)?;
            config.save(&data_dir)?;
            println!("{} {} = {}", "Saved".green(), key, value.trim());
        }
    }

    Ok(())
}
