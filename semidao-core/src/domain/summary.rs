//! Outcome of one pipeline run

use serde::Serialize;

/// Counts reported at the end of a successful run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub vendor: String,
    /// Records extracted from the bill table
    pub fetched: usize,
    /// Rows skipped because they carried no document link
    pub skipped_without_url: usize,
    /// Rows rejected because their amount or date did not parse
    pub rejected: usize,
    /// Extracted records already present in the store
    pub duplicates: usize,
    /// Records persisted by this run (would-be-new on a dry run)
    pub new_bills: usize,
    pub linked: usize,
    pub unlinked: usize,
    pub dry_run: bool,
    pub warnings: Vec<String>,
}

impl RunSummary {
    pub fn new(vendor: impl Into<String>, dry_run: bool) -> Self {
        Self {
            vendor: vendor.into(),
            dry_run,
            ..Default::default()
        }
    }
}
