//! Concurrency stress tests for contested resources.
//!
//! Many tasks race for the same seat; exactly one may win, and no seat may
//! ever end up held or committed twice.
//!
//! Run with: `cargo test --test concurrency_stress_test -- --nocapture`

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect

use seatlock_core::environment::SystemClock;
use seatlock_core::types::ReservationState;
use seatlock_runtime::{LockTable, LockTableConfig, ReservationError};
use seatlock_testing::venue;
use std::collections::HashSet;

fn shared_table() -> LockTable<SystemClock> {
    LockTable::new(venue(), SystemClock, LockTableConfig::default()).unwrap()
}

/// 100 concurrent lock attempts for one seat: one winner, 99 `HeldByOther`.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_last_seat_100_concurrent_locks() {
    let table = shared_table();

    let handles: Vec<_> = (0..100)
        .map(|i| {
            let table = table.clone();
            tokio::spawn(async move { (i, table.try_lock("C3", &format!("user-{i}"))) })
        })
        .collect();

    let mut winners = Vec::new();
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            (i, Ok(_)) => winners.push(i),
            (_, Err(ReservationError::HeldByOther { .. })) => refused += 1,
            (i, Err(other)) => panic!("attempt {i} failed unexpectedly: {other}"),
        }
    }

    assert_eq!(winners.len(), 1, "exactly one attempt must win");
    assert_eq!(refused, 99);

    let winner = format!("user-{}", winners[0]);
    match table.status("C3").unwrap() {
        ReservationState::Held { holder, .. } => assert_eq!(holder.as_str(), winner),
        other => panic!("expected C3 to be held, got {other}"),
    }
}

/// Everyone races to confirm the same hold; only its owner can.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_confirms_commit_once() {
    let table = shared_table();
    table.try_lock("D2", "user-7").unwrap();

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let table = table.clone();
            tokio::spawn(async move { table.confirm("D2", &format!("user-{}", i % 10)) })
        })
        .collect();

    let mut committed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(ReservationError::NotHeldByYou { .. } | ReservationError::AlreadyCommitted { .. }) => {},
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(committed, 1);
    assert_eq!(table.status("D2").unwrap(), ReservationState::Committed);
}

/// Holders spread over the whole venue: every seat goes to at most one holder
/// and independent seats do not block each other.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_whole_venue_contention() {
    let table = shared_table();
    let seats: Vec<String> = table.resources().map(ToString::to_string).collect();

    let handles: Vec<_> = (0..200)
        .map(|i| {
            let table = table.clone();
            let seat = seats[i % seats.len()].clone();
            tokio::spawn(async move {
                let holder = format!("user-{i}");
                let outcome = table.try_lock(&seat, &holder);
                (seat, holder, outcome)
            })
        })
        .collect();

    let mut winners = HashSet::new();
    for handle in handles {
        let (seat, _holder, outcome) = handle.await.unwrap();
        if outcome.is_ok() {
            assert!(winners.insert(seat.clone()), "{seat} granted twice");
        }
    }

    assert_eq!(winners.len(), 25);
    assert_eq!(table.summary().held, 25);
}

/// Plain OS threads, no async runtime: the table works without Tokio.
#[test]
fn test_threads_without_runtime() {
    let table = LockTable::new(venue(), SystemClock, LockTableConfig::default()).unwrap();
    assert!(!table.eager_expiry());

    let winners: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let table = &table;
                scope.spawn(move || table.try_lock("E1", &format!("thread-{i}")).is_ok())
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| usize::from(handle.join().unwrap()))
            .sum()
    });

    assert_eq!(winners, 1);
}
