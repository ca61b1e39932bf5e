//! Document fetcher port

use async_trait::async_trait;

use crate::domain::result::Result;

/// Downloads bill documents
///
/// Implemented by the portal session so downloads carry the run's cookies.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch_document(&self, url: &str) -> Result<Vec<u8>>;
}
