//! Configuration for lock tables.
//!
//! Loads from environment variables with sensible defaults. Holds last one
//! minute unless told otherwise.

use std::env;
use std::time::Duration;

use crate::error::ConfigError;

/// Default time a hold stays valid without confirmation.
pub const DEFAULT_HOLD_TTL: Duration = Duration::from_secs(60);

/// Configuration for a [`LockTable`](crate::LockTable)
///
/// # Example
///
/// ```
/// use seatlock_runtime::LockTableConfig;
/// use std::time::Duration;
///
/// let config = LockTableConfig::default()
///     .with_hold_ttl(Duration::from_secs(30))
///     .with_eager_expiry(false);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockTableConfig {
    /// How long a hold stays valid without confirmation
    pub hold_ttl: Duration,
    /// Schedule a timer per hold so lapsed holds are released without
    /// waiting for the next access. Lazy expiry always applies.
    pub eager_expiry: bool,
}

impl LockTableConfig {
    /// Create a new configuration with custom values
    #[must_use]
    pub const fn new(hold_ttl: Duration, eager_expiry: bool) -> Self {
        Self {
            hold_ttl,
            eager_expiry,
        }
    }

    /// Set the hold TTL
    #[must_use]
    pub const fn with_hold_ttl(mut self, hold_ttl: Duration) -> Self {
        self.hold_ttl = hold_ttl;
        self
    }

    /// Enable or disable eager expiry timers
    #[must_use]
    pub const fn with_eager_expiry(mut self, eager_expiry: bool) -> Self {
        self.eager_expiry = eager_expiry;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// - `SEATLOCK_HOLD_TTL_MS`: hold TTL in milliseconds (takes precedence)
    /// - `SEATLOCK_HOLD_TTL_SECS`: hold TTL in seconds (default: 60)
    /// - `SEATLOCK_EAGER_EXPIRY`: `true`/`false` (default: true)
    ///
    /// Unparseable values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// value. [`from_env`](Self::from_env) passes the process environment.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let hold_ttl = lookup("SEATLOCK_HOLD_TTL_MS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .or_else(|| {
                lookup("SEATLOCK_HOLD_TTL_SECS")
                    .and_then(|s| s.parse().ok())
                    .map(Duration::from_secs)
            })
            .unwrap_or(DEFAULT_HOLD_TTL);

        Self {
            hold_ttl,
            eager_expiry: lookup("SEATLOCK_EAGER_EXPIRY")
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
        }
    }

    /// Check the configuration can back a lock table.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTtl`] for a zero TTL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hold_ttl.is_zero() {
            return Err(ConfigError::InvalidTtl {
                reason: "hold TTL must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for LockTableConfig {
    fn default() -> Self {
        Self {
            hold_ttl: DEFAULT_HOLD_TTL,
            eager_expiry: true,
        }
    }
}
