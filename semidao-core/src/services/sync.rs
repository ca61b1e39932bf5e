//! Sync service - one end-to-end bill collection run
//!
//! Log in, fetch the bills page, extract the bill table, then dedup,
//! persist and link through the store and linker ports. Each run builds a
//! fresh portal client, so no cookie outlives it.

use std::sync::Arc;

use crate::config::PortalSettings;
use crate::domain::result::Result;
use crate::domain::{Credentials, RunSummary, DOCUMENT_CATEGORY, VENDOR};
use crate::adapters::semidao::SemidaoClient;
use crate::ports::{BankOperationLinker, BillStore, LinkConfig, LogSink, SaveOptions};
use crate::services::extract::BillExtractor;
use crate::services::reconcile::ReconcileService;

pub struct SyncService {
    portal: PortalSettings,
    log: Arc<dyn LogSink>,
    reconcile: ReconcileService,
}

impl SyncService {
    pub fn new(
        portal: PortalSettings,
        link_config: LinkConfig,
        store: Arc<dyn BillStore>,
        linker: Arc<dyn BankOperationLinker>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        let save_options = SaveOptions {
            vendor: VENDOR.to_string(),
            tags: vec![DOCUMENT_CATEGORY.to_string()],
        };
        let reconcile = ReconcileService::new(store, linker, Arc::clone(&log), save_options, link_config);

        Self {
            portal,
            log,
            reconcile,
        }
    }

    pub fn portal(&self) -> &PortalSettings {
        &self.portal
    }

    /// Run the whole pipeline once
    ///
    /// Returns `LOGIN_FAILED` without touching the bills page when the portal
    /// refuses the credentials. On a dry run nothing is persisted or linked.
    pub async fn sync(&self, credentials: &Credentials, dry_run: bool) -> Result<RunSummary> {
        let mut summary = RunSummary::new(VENDOR, dry_run);

        let mut client = SemidaoClient::new(&self.portal, Arc::clone(&self.log))?;
        let markup = client.fetch_bill_markup(credentials).await?;

        let extractor = BillExtractor::new(client.base_url(), Arc::clone(&self.log));
        let extracted = extractor.extract(Some(&markup));

        summary.fetched = extracted.bills.len();
        summary.skipped_without_url = extracted.skipped_without_url;
        summary.rejected = extracted.rejected;
        summary.warnings = extracted.warnings;

        if extracted.bills.is_empty() {
            return Ok(summary);
        }

        let outcome = self
            .reconcile
            .reconcile(extracted.bills, client.session(), dry_run)
            .await?;

        summary.duplicates = outcome.duplicates;
        summary.new_bills = outcome.new_bills;
        summary.linked = outcome.linked;
        summary.unlinked = outcome.unlinked;
        summary.warnings.extend(outcome.warnings);

        Ok(summary)
    }
}
