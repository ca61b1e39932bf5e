//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

pub mod bill;
mod credentials;
mod summary;
mod transaction;
pub mod result;

pub use bill::{BillRecord, RawBillRow, StoredBill, DOCUMENT_CATEGORY, VENDOR};
pub use credentials::Credentials;
pub use summary::RunSummary;
pub use transaction::BankTransaction;
