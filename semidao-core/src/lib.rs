//! Semidao Core - bill collection for the Semidao customer portal
//!
//! This crate implements the connector following hexagonal architecture:
//!
//! - **domain**: Core entities (BillRecord, Credentials, RunSummary, ...)
//! - **ports**: Traits for host-provided collaborators (BillStore, BankOperationLinker, LogSink)
//! - **services**: Orchestration (extraction, reconciliation, the sync run)
//! - **adapters**: Concrete implementations (reqwest session, portal client, DuckDB)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use adapters::duckdb::DuckDbRepository;
use adapters::log_sink::TracingLogSink;
use config::Config;
use ports::LogSink;
use services::SyncService;

// Re-export commonly used types at crate root
pub use domain::result::Error;
pub use domain::{BankTransaction, BillRecord, Credentials, RunSummary, StoredBill, VENDOR};

/// Name of the bill database inside the data directory
pub const DATABASE_FILE: &str = "semidao.duckdb";

/// Main context for Semidao operations
///
/// Holds the configuration, the bill database and the sync service wired
/// to it. Hosts with their own store can build a `SyncService` directly.
pub struct SemidaoContext {
    pub config: Config,
    pub data_dir: PathBuf,
    pub repository: Arc<DuckDbRepository>,
    pub sync_service: SyncService,
}

impl SemidaoContext {
    /// Create a context that logs through `tracing`
    pub fn new(data_dir: &Path) -> Result<Self> {
        Self::with_log_sink(data_dir, Arc::new(TracingLogSink))
    }

    /// Create a context with a caller-provided log sink
    pub fn with_log_sink(data_dir: &Path, log: Arc<dyn LogSink>) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let config = Config::load(data_dir)?;

        let repository = Arc::new(
            DuckDbRepository::new(&data_dir.join(DATABASE_FILE), &config.documents_dir)?
                .with_log_sink(log.clone()),
        );
        repository.ensure_schema()?;

        let sync_service = SyncService::new(
            config.portal.clone(),
            config.link_config(VENDOR),
            repository.clone(),
            repository.clone(),
            log,
        );

        Ok(Self {
            config,
            data_dir: data_dir.to_path_buf(),
            repository,
            sync_service,
        })
    }
}
