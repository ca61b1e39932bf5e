//! Concurrent access tests
//!
//! A host may trigger a run while another is still storing bills. These
//! tests check that the fingerprint constraint keeps one row per bill and
//! that the run lock refuses a second concurrent run.
//!
//! Run with: cargo test --test concurrent_access_test -- --nocapture

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tempfile::TempDir;

use semidao_core::adapters::duckdb::DuckDbRepository;
use semidao_core::adapters::lock::RunLock;
use semidao_core::{BillRecord, StoredBill, VENDOR};

const THREAD_COUNT: usize = 6;

fn create_test_bill(day: u32) -> BillRecord {
    BillRecord {
        amount: Decimal::new(1000 + day as i64, 2),
        date: NaiveDate::from_ymd_opt(2021, 3, day).unwrap(),
        vendor: VENDOR.to_string(),
        document_url: format!("http://portal.test/wp/docs/{}.pdf", day),
        reference: format!("F-{}", day),
    }
}

/// Every thread inserts the same ten bills; only ten rows may survive
#[test]
fn test_shared_repository_same_bills_from_many_threads() {
    let temp_dir = TempDir::new().unwrap();
    let repo = Arc::new(
        DuckDbRepository::new(
            &temp_dir.path().join("test.duckdb"),
            &temp_dir.path().join("documents"),
        )
        .unwrap(),
    );
    repo.ensure_schema().unwrap();

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let handles: Vec<_> = (0..THREAD_COUNT)
        .map(|_| {
            let repo = Arc::clone(&repo);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut inserted = 0;
                for day in 1..=10 {
                    let stored = StoredBill::new(create_test_bill(day), vec!["invoice".to_string()]);
                    if repo.insert_bill(&stored).unwrap() {
                        inserted += 1;
                    }
                }
                inserted
            })
        })
        .collect();

    let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(total, 10);
    assert_eq!(repo.get_bill_count().unwrap(), 10);
}

/// Only one of several simultaneous runs gets the lock
#[test]
fn test_run_lock_admits_one_run() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().to_path_buf();

    let held = RunLock::try_acquire(&data_dir).unwrap().expect("first lock");

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let handles: Vec<_> = (0..THREAD_COUNT)
        .map(|_| {
            let dir = data_dir.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                RunLock::try_acquire(&dir).unwrap().is_some()
            })
        })
        .collect();

    let acquired = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|got| *got)
        .count();
    assert_eq!(acquired, 0);

    drop(held);
    assert!(RunLock::try_acquire(&data_dir).unwrap().is_some());
}
