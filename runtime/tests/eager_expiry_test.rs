//! Integration tests for eager expiry timers.
//!
//! Tokio time is paused, so sleeping advances the timer wheel instantly.
//! `elapse` moves the table's `ManualClock` forward first and then lets the
//! timers run, keeping both notions of time in step. Assertions read the
//! stored state where it matters, so releases seen here come from timers and
//! not from lazy checks.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use chrono::TimeDelta;
use seatlock_core::types::ReservationState;
use seatlock_runtime::{LockTable, LockTableConfig, ReservationError};
use seatlock_testing::helpers::init_tracing;
use seatlock_testing::mocks::test_epoch;
use seatlock_testing::{ManualClock, holder, venue};
use std::time::Duration;

fn eager_table(ttl: Duration) -> (LockTable<ManualClock>, ManualClock) {
    init_tracing();
    let clock = ManualClock::starting_at_test_epoch();
    let config = LockTableConfig::default()
        .with_hold_ttl(ttl)
        .with_eager_expiry(true);
    (LockTable::new(venue(), clock.clone(), config).unwrap(), clock)
}

async fn elapse(clock: &ManualClock, duration: Duration) {
    clock.advance(TimeDelta::from_std(duration).unwrap());
    tokio::time::sleep(duration).await;
}

#[tokio::test(start_paused = true)]
async fn test_timer_releases_unconfirmed_hold() {
    let (table, clock) = eager_table(Duration::from_secs(60));
    assert!(table.eager_expiry());

    table.try_lock("A2", "carol").unwrap();

    elapse(&clock, Duration::from_secs(59)).await;
    assert!(matches!(table.status("A2").unwrap(), ReservationState::Held { .. }));

    elapse(&clock, Duration::from_secs(2)).await;
    assert_eq!(table.summary().held, 0);
    assert_eq!(table.status("A2").unwrap(), ReservationState::Available);
}

#[tokio::test(start_paused = true)]
async fn test_confirm_after_timer_reports_expired() {
    let (table, clock) = eager_table(Duration::from_secs(60));

    table.try_lock("A2", "carol").unwrap();
    elapse(&clock, Duration::from_secs(61)).await;

    assert_eq!(
        table.confirm("A2", "carol").unwrap_err(),
        ReservationError::Expired {
            resource: "A2".to_string(),
            expired_at: test_epoch() + TimeDelta::seconds(60),
        }
    );

    // Someone who never held it is told nobody holds it.
    assert_eq!(
        table.confirm("A2", "erin").unwrap_err(),
        ReservationError::NotHeldByYou {
            resource: "A2".to_string(),
            current_holder: None,
        }
    );

    let granted = table.try_lock("A2", "dave").unwrap();
    assert_eq!(granted.holder, holder("dave"));
}

#[tokio::test(start_paused = true)]
async fn test_confirmed_resource_survives_its_timer() {
    let (table, clock) = eager_table(Duration::from_secs(60));

    table.try_lock("A1", "alice").unwrap();
    table.confirm("A1", "alice").unwrap();

    elapse(&clock, Duration::from_secs(120)).await;
    assert_eq!(table.status("A1").unwrap(), ReservationState::Committed);
}

#[tokio::test(start_paused = true)]
async fn test_new_holder_not_released_by_previous_timer() {
    let (table, clock) = eager_table(Duration::from_secs(60));

    table.try_lock("B1", "alice").unwrap();

    // Alice's hold lapses on the table's clock before her timer runs; bob takes over.
    elapse(&clock, Duration::from_secs(30)).await;
    clock.advance(TimeDelta::seconds(30));
    let granted = table.try_lock("B1", "bob").unwrap();
    assert_eq!(granted.expires_at, test_epoch() + TimeDelta::seconds(120));

    // Past alice's first deadline on both clocks, well inside bob's.
    elapse(&clock, Duration::from_secs(45)).await;
    assert_eq!(table.status("B1").unwrap().holder(), Some(&holder("bob")));

    elapse(&clock, Duration::from_secs(20)).await;
    assert_eq!(table.status("B1").unwrap(), ReservationState::Available);
}

#[tokio::test(start_paused = true)]
async fn test_timer_never_releases_before_table_clock_deadline() {
    let (table, clock) = eager_table(Duration::from_secs(60));
    table.try_lock("A1", "alice").unwrap();

    // Timers run a full TTL while the table's clock stands still.
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(
        table.status("A1").unwrap(),
        ReservationState::Held {
            holder: holder("alice"),
            expires_at: test_epoch() + TimeDelta::seconds(60),
        }
    );
    let committed = table.confirm("A1", "alice").unwrap();
    assert_eq!(committed.committed_at, test_epoch());

    table.try_lock("A2", "bob").unwrap();
    tokio::time::sleep(Duration::from_secs(61)).await;
    elapse(&clock, Duration::from_secs(61)).await;
    assert_eq!(
        table.confirm("A2", "bob").unwrap_err(),
        ReservationError::Expired {
            resource: "A2".to_string(),
            expired_at: test_epoch() + TimeDelta::seconds(60),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_short_ttl_with_many_holds() {
    let (table, clock) = eager_table(Duration::from_millis(250));

    for (index, seat) in ["A1", "A2", "A3", "A4", "A5"].into_iter().enumerate() {
        table.try_lock(seat, &format!("holder-{index}")).unwrap();
    }
    table.confirm("A3", "holder-2").unwrap();
    assert_eq!(table.summary().held, 4);

    elapse(&clock, Duration::from_millis(300)).await;

    let summary = table.summary();
    assert_eq!(summary.held, 0);
    assert_eq!(summary.committed, 1);
    assert_eq!(summary.available, 24);
}
