//! Bank transaction domain model
//!
//! Transactions are imported by the host; the connector only reads them to
//! link bills to the debit that paid them.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single bank transaction belonging to an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: Uuid,
    pub account_id: Uuid,
    /// Signed amount; debits are negative
    pub amount: Decimal,
    pub description: Option<String>,
    pub transaction_date: NaiveDate,
    /// Bill this transaction was matched with, if any
    pub linked_bill_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl BankTransaction {
    /// Create a new transaction with required fields
    pub fn new(id: Uuid, account_id: Uuid, amount: Decimal, transaction_date: NaiveDate) -> Self {
        Self {
            id,
            account_id,
            amount,
            description: None,
            transaction_date,
            linked_bill_id: None,
            created_at: Utc::now(),
        }
    }

    /// Whether this transaction can still be matched with a bill
    pub fn is_linkable(&self) -> bool {
        self.linked_bill_id.is_none()
    }

    /// Distance between this transaction's absolute amount and `amount`
    pub fn amount_distance(&self, amount: Decimal) -> Decimal {
        (self.amount.abs() - amount.abs()).abs()
    }

    /// Signed number of days from `date` to this transaction
    pub fn days_from(&self, date: NaiveDate) -> i64 {
        (self.transaction_date - date).num_days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(amount: i64, date: NaiveDate) -> BankTransaction {
        BankTransaction::new(Uuid::new_v4(), Uuid::new_v4(), Decimal::new(amount, 2), date)
    }

    #[test]
    fn test_amount_distance_uses_absolute_values() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let debit = tx(-4250, date);
        assert_eq!(debit.amount_distance(Decimal::new(4250, 2)), Decimal::ZERO);
        assert_eq!(debit.amount_distance(Decimal::new(4240, 2)), Decimal::new(10, 2));
    }

    #[test]
    fn test_days_from() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let t = tx(-100, NaiveDate::from_ymd_opt(2024, 1, 11).unwrap());
        assert_eq!(t.days_from(date), -4);
        assert!(t.is_linkable());
    }
}
