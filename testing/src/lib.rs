//! # Seatlock Testing
//!
//! Testing utilities and helpers for the Seatlock workspace.
//!
//! This crate provides:
//! - Clocks for deterministic time (`FixedClock`, `ManualClock`)
//! - Fixtures for the standard 5×5 venue
//! - Property-based testing strategies
//! - A Given-When-Then harness for reducers
//!
//! ## Example
//!
//! ```ignore
//! use seatlock_testing::{ManualClock, venue};
//! use seatlock_runtime::{LockTable, LockTableConfig};
//!
//! #[tokio::test]
//! async fn hold_lapses() {
//!     let clock = ManualClock::starting_at_test_epoch();
//!     let table = LockTable::new(venue(), clock.clone(), LockTableConfig::default())?;
//!
//!     table.try_lock("A1", "alice")?;
//!     clock.advance(chrono::Duration::minutes(2));
//!     assert!(table.try_lock("A1", "bob").is_ok());
//! }
//! ```

use chrono::{DateTime, Utc};
use seatlock_core::environment::Clock;


pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use chrono::TimeDelta;
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use seatlock_testing::mocks::FixedClock;
    /// use seatlock_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same instant, so a test can keep one handle and give
    /// another to the table under test.
    ///
    /// ```
    /// use seatlock_testing::mocks::ManualClock;
    /// use seatlock_core::environment::Clock;
    /// use chrono::TimeDelta;
    ///
    /// let clock = ManualClock::starting_at_test_epoch();
    /// let handle = clock.clone();
    /// let before = clock.now();
    /// handle.advance(TimeDelta::seconds(90));
    /// assert_eq!(clock.now() - before, TimeDelta::seconds(90));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a manual clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Create a manual clock starting at the test epoch (see [`test_clock`])
        #[must_use]
        pub fn starting_at_test_epoch() -> Self {
            Self::new(test_epoch())
        }

        /// Move the clock forward by `by`
        pub fn advance(&self, by: TimeDelta) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump the clock to `time`
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// 2025-01-01 00:00:00 UTC
    #[must_use]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(1_735_689_600)
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }
}

/// Fixtures shared by tests across the workspace.
pub mod helpers {
    use seatlock_core::types::{HolderId, ResourceId, seat_grid};

    /// Row labels of the standard venue
    pub const VENUE_ROWS: [char; 5] = ['A', 'B', 'C', 'D', 'E'];

    /// Seats per row in the standard venue
    pub const VENUE_COLUMNS: u32 = 5;

    /// The standard 5×5 venue: `A1` through `E5`
    #[must_use]
    pub fn venue() -> Vec<ResourceId> {
        seat_grid(&VENUE_ROWS, VENUE_COLUMNS)
    }

    /// Parses a holder id that is known to be valid.
    ///
    /// # Panics
    ///
    /// Panics if `name` is blank.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn holder(name: &str) -> HolderId {
        HolderId::parse(name).expect("fixture holder ids are never blank")
    }

    /// Parses a resource id that is known to be valid.
    ///
    /// # Panics
    ///
    /// Panics if `name` is blank.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn resource(name: &str) -> ResourceId {
        ResourceId::parse(name).expect("fixture resource ids are never blank")
    }

    /// Install a test-friendly tracing subscriber; repeated calls are harmless.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "seatlock_runtime=debug".into()),
            )
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;

    /// One step of a randomly generated workload against a lock table.
    #[derive(Debug, Clone)]
    pub enum Op {
        /// `try_lock(resource, holder)`
        TryLock {
            /// Resource name
            resource: String,
            /// Holder name
            holder: String,
        },
        /// `confirm(resource, holder)`
        Confirm {
            /// Resource name
            resource: String,
            /// Holder name
            holder: String,
        },
        /// Move the clock forward
        Advance {
            /// Seconds to advance
            seconds: i64,
        },
        /// `status(resource)`
        Status {
            /// Resource name
            resource: String,
        },
    }

    /// A small pool of holders so collisions are frequent.
    pub fn holder_strategy() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["alice", "bob", "carol", "dave"]).prop_map(str::to_string)
    }

    /// Seats from the first row of the standard venue, plus an unknown one.
    pub fn resource_strategy() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["A1", "A2", "A3", "Z9"]).prop_map(str::to_string)
    }

    /// A single operation; clock advances range up to two TTLs of 60 s.
    pub fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (resource_strategy(), holder_strategy())
                .prop_map(|(resource, holder)| Op::TryLock { resource, holder }),
            3 => (resource_strategy(), holder_strategy())
                .prop_map(|(resource, holder)| Op::Confirm { resource, holder }),
            2 => (1i64..=120).prop_map(|seconds| Op::Advance { seconds }),
            1 => resource_strategy().prop_map(|resource| Op::Status { resource }),
        ]
    }

    /// A workload of up to `max_len` operations.
    pub fn workload_strategy(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
        prop::collection::vec(op_strategy(), 1..=max_len)
    }
}

// Re-export commonly used items
pub use helpers::{holder, resource, venue};
pub use mocks::{FixedClock, ManualClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
        assert_eq!(time1.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_manual_clock_shares_time_across_clones() {
        let clock = ManualClock::starting_at_test_epoch();
        let other = clock.clone();

        other.advance(TimeDelta::minutes(1));

        assert_eq!(clock.now(), mocks::test_epoch() + TimeDelta::minutes(1));
    }

    #[test]
    fn test_venue_has_twenty_five_seats() {
        let seats = venue();
        assert_eq!(seats.len(), 25);
        assert_eq!(seats.first().map(|s| s.as_str()), Some("A1"));
        assert_eq!(seats.last().map(|s| s.as_str()), Some("E5"));
    }
}
