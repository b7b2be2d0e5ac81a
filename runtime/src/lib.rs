//! # Seatlock Runtime
//!
//! The imperative shell around the pure reservation state machine in
//! `seatlock-core`.
//!
//! ## Core Components
//!
//! - **`LockTable`**: owns one record per resource, serializes access per
//!   record and runs the reducer under that record's lock
//! - **Effect execution**: turns `Effect::Delay` into a cancellable Tokio
//!   timer and `Effect::Cancel` into an abort
//! - **Configuration**: [`LockTableConfig`], loadable from the environment
//! - **Metrics**: counters and histograms through the `metrics` facade
//!
//! ## Example
//!
//! ```no_run
//! use seatlock_core::environment::SystemClock;
//! use seatlock_core::types::seat_grid;
//! use seatlock_runtime::{LockTable, LockTableConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let seats = seat_grid(&['A', 'B', 'C', 'D', 'E'], 5);
//! let table = LockTable::new(seats, SystemClock, LockTableConfig::default())?;
//!
//! let granted = table.try_lock("A1", "alice")?;
//! println!("A1 held until {}", granted.expires_at);
//!
//! table.confirm("A1", "alice")?;
//! # Ok(())
//! # }
//! ```

/// Prometheus metrics for observability
pub mod metrics;

pub mod config;

mod table;

/// Error types for the runtime
pub mod error {
    use seatlock_core::HoldTtlError;
    use seatlock_core::types::ResourceId;
    use thiserror::Error;

    /// Errors raised while building a lock table
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum ConfigError {
        /// The hold TTL cannot be used
        #[error("invalid hold TTL: {reason}")]
        InvalidTtl {
            /// What is wrong with it
            reason: String,
        },

        /// The resource universe is empty
        #[error("a lock table needs at least one resource")]
        EmptyUniverse,

        /// The same resource appears twice in the universe
        #[error("resource {resource} appears more than once")]
        DuplicateResource {
            /// The repeated resource
            resource: ResourceId,
        },
    }

    impl From<HoldTtlError> for ConfigError {
        fn from(err: HoldTtlError) -> Self {
            Self::InvalidTtl {
                reason: err.to_string(),
            }
        }
    }
}

pub use config::LockTableConfig;
pub use error::ConfigError;
pub use seatlock_core::ReservationError;
pub use table::LockTable;
