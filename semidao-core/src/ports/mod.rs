//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for the host-provided collaborators. The
//! pipeline depends only on these traits, not on concrete implementations.

mod document;
mod linker;
mod log_sink;
mod repository;

pub use document::DocumentFetcher;
pub use linker::{BankOperationLinker, BillLink, LinkConfig, LinkResult};
pub use log_sink::{LogLevel, LogSink};
pub use repository::{BillStore, SaveOptions};
