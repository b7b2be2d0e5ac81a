//! Seat booking walkthrough
//!
//! Builds a venue of seats and plays the booking flow against a lock table:
//!
//! 1. alice locks `A1`, bob is turned away, alice confirms
//! 2. carol locks `A2` and lets it lapse; her late confirmation is refused
//!    and dave takes the seat
//! 3. the venue is listed as JSON, summarized, and metrics are printed
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin seat-booking
//!
//! # Bigger venue, quieter logs
//! SEAT_ROWS=ABCDEFGH SEAT_COLUMNS=12 RUST_LOG=warn cargo run --bin seat-booking
//! ```

mod config;

use config::Config;
use seatlock_core::environment::SystemClock;
use seatlock_core::types::{ReservationState, seat_grid};
use seatlock_runtime::metrics::MetricsRecorder;
use seatlock_runtime::LockTable;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Hold TTL for the lapse scenario, so the demo does not wait a full minute.
const SHORT_TTL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut recorder = MetricsRecorder::new();
    if config.metrics {
        recorder.install()?;
    }

    tracing::info!(
        rows = %config.venue.rows.iter().collect::<String>(),
        columns = config.venue.columns,
        hold_ttl = ?config.table.hold_ttl,
        "Configuration loaded"
    );

    println!("=== Seat Booking ===\n");

    let venue = LockTable::new(
        seat_grid(&config.venue.rows, config.venue.columns),
        SystemClock,
        config.table.clone(),
    )?;
    println!("Venue has {} seats, holds last {:?}\n", venue.len(), venue.hold_ttl());

    book_and_confirm(&venue)?;

    // Same venue layout, short holds.
    let short = LockTable::new(
        seat_grid(&config.venue.rows, config.venue.columns),
        SystemClock,
        config.table.clone().with_hold_ttl(SHORT_TTL),
    )?;
    lapse_and_rebook(&short).await?;

    println!("\n>>> Listing the first venue");
    let listing: BTreeMap<String, ReservationState> = venue
        .list_all()
        .into_iter()
        .map(|(seat, state)| (seat.to_string(), state))
        .collect();
    println!("{}", serde_json::to_string_pretty(&listing)?);

    let summary = venue.summary();
    println!(
        "\nSummary: {} available, {} held, {} committed",
        summary.available, summary.held, summary.committed
    );

    if let Some(exposition) = recorder.render() {
        println!("\n=== Metrics ===\n{exposition}");
    }

    Ok(())
}

fn book_and_confirm(venue: &LockTable<SystemClock>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(seat) = venue.resources().next().map(ToString::to_string) else {
        return Ok(());
    };

    println!(">>> alice locks {seat}");
    let granted = venue.try_lock(&seat, "alice")?;
    println!("    held until {}", granted.expires_at.to_rfc3339());

    println!(">>> bob tries {seat}");
    match venue.try_lock(&seat, "bob") {
        Ok(_) => println!("    granted (unexpected)"),
        Err(err) => println!("    refused [{}]: {err}", err.code()),
    }

    println!(">>> alice confirms {seat}");
    let committed = venue.confirm(&seat, "alice")?;
    println!("    committed at {}", committed.committed_at.to_rfc3339());

    println!(">>> bob tries {seat} again");
    if let Err(err) = venue.try_lock(&seat, "bob") {
        println!("    refused [{}]: {err}", err.code());
    }

    Ok(())
}

async fn lapse_and_rebook(venue: &LockTable<SystemClock>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(seat) = venue.resources().nth(1).map(ToString::to_string) else {
        return Ok(());
    };

    println!("\n>>> carol locks {seat} for {SHORT_TTL:?}");
    venue.try_lock(&seat, "carol")?;

    tokio::time::sleep(SHORT_TTL + Duration::from_millis(100)).await;
    println!("    {seat} is now {}", venue.status(&seat)?);

    println!(">>> carol confirms {seat} late");
    if let Err(err) = venue.confirm(&seat, "carol") {
        println!("    refused [{}]: {err}", err.code());
    }

    println!(">>> dave locks {seat}");
    let granted = venue.try_lock(&seat, "dave")?;
    println!("    held by {} until {}", granted.holder, granted.expires_at.to_rfc3339());

    Ok(())
}
