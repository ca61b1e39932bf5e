//! DuckDB repository implementation
//!
//! Stores scraped bills in `sys_bills` and the host's bank transactions in
//! `sys_transactions`. Implements both the `BillStore` and the
//! `BankOperationLinker` ports.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use duckdb::{params, Connection};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error as DomainError, Result as DomainResult};
use crate::domain::{BankTransaction, BillRecord, StoredBill, DOCUMENT_CATEGORY};
use crate::ports::{
    BankOperationLinker, BillLink, BillStore, DocumentFetcher, LinkConfig, LinkResult, LogSink,
    SaveOptions,
};

use super::log_sink::TracingLogSink;
use crate::services::matching;
use crate::services::MigrationService;

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

const BILL_COLUMNS: &str = "bill_id, vendor, reference, bill_date::VARCHAR, amount::VARCHAR,
    document_url, document_path, fingerprint, tags, linked_transaction_id, created_at";

const TRANSACTION_COLUMNS: &str = "transaction_id, account_id, amount::VARCHAR,
    transaction_date::VARCHAR, description, linked_bill_id, created_at";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("could not set lock on file")
}

/// DuckDB repository implementation
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    documents_dir: PathBuf,
    log: Arc<dyn LogSink>,
}

impl DuckDbRepository {
    /// Open (or create) the bill database
    ///
    /// Retries with exponential backoff while another process holds the file.
    pub fn new(db_path: &Path, documents_dir: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: db_path.to_path_buf(),
                        documents_dir: documents_dir.to_path_buf(),
                        log: Arc::new(TracingLogSink),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            "Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
    }

    /// Report skipped documents through `log` instead of `tracing`
    pub fn with_log_sink(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading is not needed and can trip code signing on macOS
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))
    }

    /// Run pending migrations
    pub fn run_migrations(&self) -> Result<crate::services::MigrationResult> {
        let conn = self.conn()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    // === Bill operations ===

    /// Stored bills for a vendor, most recent bill date first
    pub fn list_bills(&self, vendor: &str) -> Result<Vec<StoredBill>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_bills WHERE vendor = ? ORDER BY bill_date DESC, created_at DESC",
            BILL_COLUMNS
        ))?;

        let bills = stmt
            .query_map([vendor], |row| Ok(row_to_bill(row)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(bills)
    }

    pub fn get_bill_count(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sys_bills", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn fingerprint_exists(&self, fingerprint: &str) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sys_bills WHERE fingerprint = ?",
            [fingerprint],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert a bill unless its fingerprint is already stored
    ///
    /// Returns whether a row was written.
    pub fn insert_bill(&self, stored: &StoredBill) -> Result<bool> {
        let conn = self.conn()?;
        let tags = serde_json::to_string(&stored.tags)?;

        let inserted = conn.execute(
            "INSERT INTO sys_bills (bill_id, vendor, reference, bill_date, amount, document_url,
                document_path, fingerprint, tags, linked_transaction_id, created_at)
             VALUES (?, ?, ?, CAST(? AS DATE), CAST(? AS DECIMAL(18, 2)), ?, ?, ?, ?, ?, ?)
             ON CONFLICT DO NOTHING",
            params![
                stored.id.to_string(),
                stored.bill.vendor,
                stored.bill.reference,
                stored.bill.date.format("%Y-%m-%d").to_string(),
                stored.bill.amount.to_string(),
                stored.bill.document_url,
                stored.document_path,
                stored.fingerprint,
                tags,
                stored.linked_transaction_id.map(|id| id.to_string()),
                stored.created_at.to_rfc3339(),
            ],
        )?;

        Ok(inserted > 0)
    }

    /// Write a bill document under `<documents>/<vendor>/<category>/`
    pub fn write_document(
        &self,
        vendor: &str,
        category: &str,
        file_name: &str,
        content: &[u8],
    ) -> Result<PathBuf> {
        let dir = self
            .documents_dir
            .join(sanitize_segment(vendor))
            .join(sanitize_segment(category));
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(sanitize_segment(file_name));
        std::fs::write(&path, content)?;
        Ok(path)
    }

    // === Transaction operations ===

    /// Insert or update a bank transaction; an existing link is kept
    pub fn upsert_transaction(&self, tx: &BankTransaction) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_transactions (transaction_id, account_id, amount, transaction_date,
                description, linked_bill_id, created_at)
             VALUES (?, ?, CAST(? AS DECIMAL(18, 2)), CAST(? AS DATE), ?, ?, ?)
             ON CONFLICT (transaction_id) DO UPDATE SET
                account_id = EXCLUDED.account_id,
                amount = EXCLUDED.amount,
                transaction_date = EXCLUDED.transaction_date,
                description = EXCLUDED.description,
                linked_bill_id = COALESCE(sys_transactions.linked_bill_id, EXCLUDED.linked_bill_id)",
            params![
                tx.id.to_string(),
                tx.account_id.to_string(),
                tx.amount.to_string(),
                tx.transaction_date.format("%Y-%m-%d").to_string(),
                tx.description,
                tx.linked_bill_id.map(|id| id.to_string()),
                tx.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_transactions(&self) -> Result<Vec<BankTransaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_transactions ORDER BY transaction_date DESC",
            TRANSACTION_COLUMNS
        ))?;

        let txs = stmt
            .query_map([], |row| Ok(row_to_transaction(row)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(txs)
    }

    /// Unlinked transactions dated within `[start, end]`
    pub fn get_linkable_transactions(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BankTransaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_transactions
             WHERE linked_bill_id IS NULL
               AND transaction_date BETWEEN CAST(? AS DATE) AND CAST(? AS DATE)
             ORDER BY transaction_date",
            TRANSACTION_COLUMNS
        ))?;

        let txs = stmt
            .query_map(
                [
                    start.format("%Y-%m-%d").to_string(),
                    end.format("%Y-%m-%d").to_string(),
                ],
                |row| Ok(row_to_transaction(row)),
            )?
            .filter_map(|r| r.ok())
            .collect();

        Ok(txs)
    }

    /// Record a link on both the bill and the transaction
    pub fn record_link(&self, link: &BillLink) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE sys_bills SET linked_transaction_id = ? WHERE bill_id = ?",
            [link.transaction_id.to_string(), link.bill_id.to_string()],
        )?;
        tx.execute(
            "UPDATE sys_transactions SET linked_bill_id = ? WHERE transaction_id = ?",
            [link.bill_id.to_string(), link.transaction_id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn to_domain(e: anyhow::Error) -> DomainError {
    DomainError::database(e.to_string())
}

#[async_trait]
impl BillStore for DuckDbRepository {
    async fn filter_existing(&self, bills: Vec<BillRecord>) -> DomainResult<Vec<BillRecord>> {
        let mut seen = HashSet::new();
        let mut fresh = Vec::new();

        for bill in bills {
            let fingerprint = bill.fingerprint();
            // Same bill listed twice on the page counts once
            if !seen.insert(fingerprint.clone()) {
                continue;
            }
            if !self.fingerprint_exists(&fingerprint).map_err(to_domain)? {
                fresh.push(bill);
            }
        }

        Ok(fresh)
    }

    async fn save_data_and_file(
        &self,
        bills: &[BillRecord],
        options: &SaveOptions,
        fetcher: &dyn DocumentFetcher,
    ) -> DomainResult<Vec<StoredBill>> {
        let category = options
            .tags
            .first()
            .map(String::as_str)
            .unwrap_or(DOCUMENT_CATEGORY);
        let mut saved = Vec::new();

        for bill in bills {
            if self.fingerprint_exists(&bill.fingerprint()).map_err(to_domain)? {
                continue;
            }

            // A bill whose document cannot be fetched is left for the next run
            let content = match fetcher.fetch_document(&bill.document_url).await {
                Ok(c) => c,
                Err(e) => {
                    self.log.warning(&format!(
                        "Document for bill dated {} ({}) not downloaded: {}",
                        bill.date, bill.document_url, e
                    ));
                    continue;
                }
            };

            let path = self
                .write_document(&options.vendor, category, &bill.document_file_name(), &content)
                .map_err(to_domain)?;

            let mut stored = StoredBill::new(bill.clone(), options.tags.clone());
            stored.document_path = Some(path.display().to_string());

            if self.insert_bill(&stored).map_err(to_domain)? {
                saved.push(stored);
            }
        }

        Ok(saved)
    }

    async fn get_bills(&self, vendor: &str) -> DomainResult<Vec<StoredBill>> {
        self.list_bills(vendor).map_err(to_domain)
    }
}

#[async_trait]
impl BankOperationLinker for DuckDbRepository {
    async fn link_bank_operation(
        &self,
        bills: &[StoredBill],
        config: &LinkConfig,
    ) -> DomainResult<LinkResult> {
        let windows: Vec<(NaiveDate, NaiveDate)> = bills
            .iter()
            .map(|b| matching::date_window(b.bill.date, config))
            .collect();
        let (Some(start), Some(end)) = (
            windows.iter().map(|w| w.0).min(),
            windows.iter().map(|w| w.1).max(),
        ) else {
            return Ok(LinkResult::default());
        };

        let candidates = self
            .get_linkable_transactions(start, end)
            .map_err(to_domain)?;
        let result = matching::match_bills(bills, &candidates, config);

        for link in &result.linked {
            self.record_link(link).map_err(to_domain)?;
        }

        Ok(result)
    }
}

fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

fn row_to_bill(row: &duckdb::Row) -> StoredBill {
    // 0: bill_id, 1: vendor, 2: reference, 3: bill_date, 4: amount, 5: document_url,
    // 6: document_path, 7: fingerprint, 8: tags, 9: linked_transaction_id, 10: created_at
    let id_str: String = row.get(0).unwrap_or_default();
    let date_str: String = row.get(3).unwrap_or_default();
    let amount_str: String = row.get(4).unwrap_or_default();
    let tags_str: String = row.get(8).unwrap_or_else(|_| "[]".to_string());
    let linked: Option<String> = row.get(9).ok().flatten();
    let created_str: String = row.get(10).unwrap_or_default();

    StoredBill {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::new_v4()),
        bill: BillRecord {
            amount: Decimal::from_str(&amount_str).unwrap_or_default(),
            date: parse_date(&date_str),
            vendor: row.get(1).unwrap_or_default(),
            document_url: row.get(5).unwrap_or_default(),
            reference: row.get::<_, Option<String>>(2).ok().flatten().unwrap_or_default(),
        },
        fingerprint: row.get(7).unwrap_or_default(),
        document_path: row.get(6).ok().flatten(),
        tags: serde_json::from_str(&tags_str).unwrap_or_default(),
        linked_transaction_id: linked.and_then(|s| Uuid::parse_str(&s).ok()),
        created_at: parse_timestamp(&created_str),
    }
}

fn row_to_transaction(row: &duckdb::Row) -> BankTransaction {
    // 0: transaction_id, 1: account_id, 2: amount, 3: transaction_date,
    // 4: description, 5: linked_bill_id, 6: created_at
    let id_str: String = row.get(0).unwrap_or_default();
    let account_str: String = row.get(1).unwrap_or_default();
    let amount_str: String = row.get(2).unwrap_or_default();
    let date_str: String = row.get(3).unwrap_or_default();
    let linked: Option<String> = row.get(5).ok().flatten();
    let created_str: String = row.get(6).unwrap_or_default();

    BankTransaction {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::new_v4()),
        account_id: Uuid::parse_str(&account_str).unwrap_or_else(|_| Uuid::new_v4()),
        amount: Decimal::from_str(&amount_str).unwrap_or_default(),
        description: row.get(4).ok().flatten(),
        transaction_date: parse_date(&date_str),
        linked_bill_id: linked.and_then(|s| Uuid::parse_str(&s).ok()),
        created_at: parse_timestamp(&created_str),
    }
}

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_default()
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
