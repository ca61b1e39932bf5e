//! Bill to bank transaction matching
//!
//! A transaction is a candidate for a bill when it is not linked yet, falls
//! inside `[bill date - min_date_delta, bill date + max_date_delta]` and its
//! absolute amount is within `amount_delta` of the bill amount. Debits rank
//! before credits, then the closest date wins, then the closest amount.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use crate::domain::{BankTransaction, BillRecord, StoredBill};
use crate::ports::{BillLink, LinkConfig, LinkResult};

/// Inclusive date window in which a payment for `bill_date` may be found
pub fn date_window(bill_date: NaiveDate, config: &LinkConfig) -> (NaiveDate, NaiveDate) {
    (
        bill_date - Duration::days(config.min_date_delta),
        bill_date + Duration::days(config.max_date_delta),
    )
}

fn is_candidate(bill: &BillRecord, tx: &BankTransaction, config: &LinkConfig) -> bool {
    let (start, end) = date_window(bill.date, config);
    tx.is_linkable()
        && tx.transaction_date >= start
        && tx.transaction_date <= end
        && tx.amount_distance(bill.amount) <= config.amount_delta
}

/// Best candidate transaction for `bill`, ignoring ids in `taken`
pub fn best_match<'a>(
    bill: &BillRecord,
    transactions: &'a [BankTransaction],
    config: &LinkConfig,
    taken: &HashSet<Uuid>,
) -> Option<&'a BankTransaction> {
    transactions
        .iter()
        .filter(|tx| !taken.contains(&tx.id))
        .filter(|tx| is_candidate(bill, tx, config))
        .min_by_key(|tx| {
            (
                tx.amount.is_sign_positive(),
                tx.days_from(bill.date).abs(),
                tx.amount_distance(bill.amount),
            )
        })
}

/// Match every bill against `transactions`; each transaction is used at most once
pub fn match_bills(
    bills: &[StoredBill],
    transactions: &[BankTransaction],
    config: &LinkConfig,
) -> LinkResult {
    let mut taken = HashSet::new();
    let mut result = LinkResult::default();

    for stored in bills {
        if stored.linked_transaction_id.is_some() {
            continue;
        }
        match best_match(&stored.bill, transactions, config, &taken) {
            Some(tx) => {
                taken.insert(tx.id);
                result.linked.push(BillLink {
                    bill_id: stored.id,
                    transaction_id: tx.id,
                });
            }
            None => result.unlinked.push(stored.id),
        }
    }

    result
}
