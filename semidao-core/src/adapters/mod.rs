//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - reqwest session with a cookie jar for the portal (and DocumentFetcher)
//! - Semidao portal client driving the login sequence
//! - DuckDB for the BillStore and BankOperationLinker ports
//! - tracing / in-memory LogSink implementations

pub mod duckdb;
pub mod lock;
pub mod log_sink;
pub mod semidao;
pub mod session;

#[cfg(test)]
pub mod portal_mock;
