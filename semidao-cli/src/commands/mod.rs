//! CLI command implementations

pub mod bills;
pub mod config;
pub mod logs;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use semidao_core::services::{EntryPoint, LogEvent, LoggingService};
use semidao_core::SemidaoContext;

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (it never blocks a command)
pub fn get_logger() -> Option<LoggingService> {
    let data_dir = get_data_dir().ok()?;
    LoggingService::new(&data_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        if let Err(e) = l.log(event) {
            tracing::debug!("run log unavailable: {}", e);
        }
    }
}

/// Data directory from `SEMIDAO_DIR`, or `~/.semidao`
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("SEMIDAO_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".semidao"))
        .context("Could not find home directory; set SEMIDAO_DIR")
}

/// Open the context for the data directory, creating it if needed
pub fn get_context() -> Result<SemidaoContext> {
    let data_dir = get_data_dir()?;

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    SemidaoContext::new(&data_dir).context("Failed to initialize semidao context")
}
