//! Reconcile service - dedup, persist and link extracted bills

use std::sync::Arc;

use crate::domain::result::Result;
use crate::domain::{BillRecord, StoredBill};
use crate::ports::{BankOperationLinker, BillStore, DocumentFetcher, LinkConfig, LogSink, SaveOptions};

/// What happened to one batch of extracted bills
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub duplicates: usize,
    /// Bills that were (or on a dry run, would be) new
    pub new_bills: usize,
    pub stored: Vec<StoredBill>,
    pub linked: usize,
    pub unlinked: usize,
    pub warnings: Vec<String>,
}

pub struct ReconcileService {
    store: Arc<dyn BillStore>,
    linker: Arc<dyn BankOperationLinker>,
    log: Arc<dyn LogSink>,
    save_options: SaveOptions,
    link_config: LinkConfig,
}

impl ReconcileService {
    pub fn new(
        store: Arc<dyn BillStore>,
        linker: Arc<dyn BankOperationLinker>,
        log: Arc<dyn LogSink>,
        save_options: SaveOptions,
        link_config: LinkConfig,
    ) -> Self {
        Self {
            store,
            linker,
            log,
            save_options,
            link_config,
        }
    }

    /// Hand `bills` to the store and the linker
    ///
    /// Store failures abort; a linker failure only leaves the new bills
    /// unlinked and adds a warning.
    pub async fn reconcile(
        &self,
        bills: Vec<BillRecord>,
        fetcher: &dyn DocumentFetcher,
        dry_run: bool,
    ) -> Result<ReconcileOutcome> {
        let mut outcome = ReconcileOutcome::default();
        let total = bills.len();

        let fresh = self.store.filter_existing(bills).await?;
        outcome.duplicates = total.saturating_sub(fresh.len());
        outcome.new_bills = fresh.len();

        if dry_run {
            self.log.info(&format!(
                "Dry run: {} new bill(s), {} already stored",
                fresh.len(),
                outcome.duplicates
            ));
            return Ok(outcome);
        }

        if fresh.is_empty() {
            self.log.info("No new bills to import");
            return Ok(outcome);
        }

        let mut stored = self
            .store
            .save_data_and_file(&fresh, &self.save_options, fetcher)
            .await?;
        outcome.new_bills = stored.len();

        // Bills the store skipped (usually a failed download) come back next run
        for bill in fresh
            .iter()
            .filter(|b| !stored.iter().any(|s| s.fingerprint == b.fingerprint()))
        {
            let message = format!(
                "Bill dated {} for {} not saved; it will be retried on the next run",
                bill.date, bill.amount
            );
            self.log.warning(&message);
            outcome.warnings.push(message);
        }
        self.log.info(&format!("Saved {} new bill(s)", stored.len()));

        if !stored.is_empty() {
            match self.linker.link_bank_operation(&stored, &self.link_config).await {
                Ok(result) => {
                    outcome.linked = result.linked.len();
                    outcome.unlinked = result.unlinked.len();
                    for link in &result.linked {
                        if let Some(bill) = stored.iter_mut().find(|s| s.id == link.bill_id) {
                            bill.linked_transaction_id = Some(link.transaction_id);
                        }
                    }
                    self.log.debug(&format!(
                        "Linked {} bill(s) to bank operations, {} unmatched",
                        outcome.linked, outcome.unlinked
                    ));
                }
                Err(e) => {
                    let message = format!("Linking bank operations failed: {}", e);
                    self.log.warning(&message);
                    outcome.warnings.push(message);
                    outcome.unlinked = stored.len();
                }
            }
        }

        outcome.stored = stored;
        Ok(outcome)
    }
}
