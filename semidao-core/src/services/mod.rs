//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on one step of a run or one supporting concern.

pub mod extract;
pub mod logging;
pub mod matching;
pub mod migration;
pub mod reconcile;
mod sync;

pub use extract::{BillExtractor, ExtractionResult};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use reconcile::{ReconcileOutcome, ReconcileService};
pub use sync::SyncService;
