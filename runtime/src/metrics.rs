//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for the lock table:
//! - Lock and confirm attempts, by outcome
//! - Hold expirations, by how they were noticed
//! - Expiry timers scheduled, cancelled and pending
//! - Time spent inside a record's critical section
//!
//! Metrics go through the `metrics` facade, so nothing is recorded until a
//! recorder is installed.
//!
//! # Example
//!
//! ```rust,no_run
//! use seatlock_runtime::metrics::MetricsRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut recorder = MetricsRecorder::new();
//! recorder.install()?;
//!
//! // ... use lock tables ...
//!
//! if let Some(exposition) = recorder.render() {
//!     println!("{exposition}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder for lock table metrics.
///
/// Installs a process-wide recorder and renders the Prometheus text
/// exposition on demand. Serving it over HTTP is left to the host
/// application.
#[derive(Default)]
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl MetricsRecorder {
    /// Create a recorder that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), this
    /// logs a warning and succeeds without a handle, so [`render`](Self::render)
    /// returns `None`.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        // Register all metric descriptions
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.000_001, 0.000_005, 0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this recorder was not the one installed.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "reservation_lock_attempts_total",
        "Lock attempts by outcome (granted, extended, or error code)"
    );
    describe_counter!(
        "reservation_confirm_attempts_total",
        "Confirmation attempts by outcome (committed or error code)"
    );
    describe_counter!(
        "reservation_expirations_total",
        "Holds released after lapsing, by mode (lazy, eager)"
    );
    describe_counter!(
        "reservation_timers_scheduled_total",
        "Expiry timers scheduled"
    );
    describe_counter!(
        "reservation_timers_cancelled_total",
        "Expiry timers cancelled before firing"
    );
    describe_gauge!(
        "reservation_timers_pending",
        "Expiry timers currently waiting to fire"
    );
    describe_histogram!(
        "reservation_critical_section_duration_seconds",
        "Time spent holding a record lock, by operation"
    );
}

/// Lock table metrics recorder.
pub struct ReservationMetrics;

impl ReservationMetrics {
    /// Record a lock attempt; `outcome` is `granted`, `extended` or an error code.
    pub fn record_lock(outcome: &'static str) {
        counter!("reservation_lock_attempts_total", "outcome" => outcome).increment(1);
    }

    /// Record a confirmation attempt; `outcome` is `committed` or an error code.
    pub fn record_confirm(outcome: &'static str) {
        counter!("reservation_confirm_attempts_total", "outcome" => outcome).increment(1);
    }

    /// Record a hold released after lapsing; `mode` is `lazy` or `eager`.
    pub fn record_expiration(mode: &'static str) {
        counter!("reservation_expirations_total", "mode" => mode).increment(1);
    }

    /// Record a newly scheduled expiry timer.
    pub fn record_timer_scheduled() {
        counter!("reservation_timers_scheduled_total").increment(1);
        gauge!("reservation_timers_pending").increment(1.0);
    }

    /// Record a timer cancelled before it fired.
    pub fn record_timer_cancelled() {
        counter!("reservation_timers_cancelled_total").increment(1);
        gauge!("reservation_timers_pending").decrement(1.0);
    }

    /// Record a timer that fired.
    pub fn record_timer_fired() {
        gauge!("reservation_timers_pending").decrement(1.0);
    }

    /// Record time spent inside a record's critical section.
    pub fn record_critical_section(operation: &'static str, duration: Duration) {
        histogram!("reservation_critical_section_duration_seconds", "operation" => operation)
            .record(duration.as_secs_f64());
    }
}
