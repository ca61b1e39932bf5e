//! Bill store port - persisted record set owned by the host

use async_trait::async_trait;

use crate::domain::result::Result;
use crate::domain::{BillRecord, StoredBill};

use super::DocumentFetcher;

/// How new bills are labelled when persisted
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Vendor label the documents are filed under
    pub vendor: String,
    /// Document category tags (e.g. "invoice")
    pub tags: Vec<String>,
}

/// Persisted bill collection
///
/// The equality policy used by `filter_existing` belongs to the
/// implementation; the pipeline never compares bills itself.
#[async_trait]
pub trait BillStore: Send + Sync {
    /// Drop every bill already present in the store.
    ///
    /// Order of the surviving bills is preserved.
    async fn filter_existing(&self, bills: Vec<BillRecord>) -> Result<Vec<BillRecord>>;

    /// Persist each bill and its document, downloaded through `fetcher`
    async fn save_data_and_file(
        &self,
        bills: &[BillRecord],
        options: &SaveOptions,
        fetcher: &dyn DocumentFetcher,
    ) -> Result<Vec<StoredBill>>;

    /// All stored bills for a vendor, most recent first
    async fn get_bills(&self, vendor: &str) -> Result<Vec<StoredBill>>;
}
