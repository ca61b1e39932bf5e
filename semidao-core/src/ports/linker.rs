//! Bank operation linker port

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::StoredBill;

/// Matching window used to find the transaction that paid a bill
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Vendor identifier the links are recorded under
    pub vendor: String,
    /// Days before the bill date a payment may occur
    pub min_date_delta: i64,
    /// Days after the bill date a payment may occur
    pub max_date_delta: i64,
    /// Tolerated difference between bill amount and payment amount
    pub amount_delta: Decimal,
}

impl LinkConfig {
    pub fn new(vendor: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
            min_date_delta: 4,
            max_date_delta: 25,
            amount_delta: Decimal::new(1, 1),
        }
    }
}

/// A bill matched with a bank transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillLink {
    pub bill_id: Uuid,
    pub transaction_id: Uuid,
}

/// Result of a linking pass
#[derive(Debug, Clone, Default)]
pub struct LinkResult {
    pub linked: Vec<BillLink>,
    /// Bills for which no matching transaction was found
    pub unlinked: Vec<Uuid>,
}

/// Associates newly stored bills with previously recorded bank transactions
#[async_trait]
pub trait BankOperationLinker: Send + Sync {
    async fn link_bank_operation(
        &self,
        bills: &[StoredBill],
        config: &LinkConfig,
    ) -> Result<LinkResult>;
}
