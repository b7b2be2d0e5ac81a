//! Configuration for the seat booking demo.
//!
//! Loads configuration from environment variables with sensible defaults.

use seatlock_runtime::LockTableConfig;
use serde::{Deserialize, Serialize};
use std::env;

/// Demo configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Venue layout
    pub venue: VenueConfig,
    /// Log filter (same syntax as `RUST_LOG`)
    pub log_level: String,
    /// Install the Prometheus recorder and print the exposition at exit
    pub metrics: bool,
    /// Lock table settings
    #[serde(skip, default)]
    pub table: LockTableConfig,
}

/// Venue layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Row labels, one seat row per character
    pub rows: Vec<char>,
    /// Seats per row, numbered from 1
    pub columns: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// - `SEAT_ROWS`: row labels (default: `ABCDE`); whitespace is ignored
    /// - `SEAT_COLUMNS`: seats per row (default: 5)
    /// - `RUST_LOG`: log filter (default: `info,seatlock_runtime=debug`)
    /// - `DEMO_METRICS`: `true`/`false` (default: true)
    /// - `SEATLOCK_*`: see [`LockTableConfig::from_env`]
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// value.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            venue: VenueConfig {
                rows: lookup("SEAT_ROWS")
                    .map(|s| parse_rows(&s))
                    .filter(|rows| !rows.is_empty())
                    .unwrap_or_else(|| parse_rows("ABCDE")),
                columns: lookup("SEAT_COLUMNS")
                    .and_then(|s| s.parse().ok())
                    .filter(|columns| *columns > 0)
                    .unwrap_or(5),
            },
            log_level: lookup("RUST_LOG")
                .unwrap_or_else(|| "info,seatlock_runtime=debug".to_string()),
            metrics: lookup("DEMO_METRICS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
            table: LockTableConfig::from_lookup(&lookup),
        }
    }
}

fn parse_rows(raw: &str) -> Vec<char> {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}
