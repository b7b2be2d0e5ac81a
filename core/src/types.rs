//! Domain types for the reservation lock table.
//!
//! These are the values that cross the boundary to whatever layer drives the
//! table (an HTTP router, a CLI, a test). All of them are owned, cloneable and
//! serializable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::error::ReservationError;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a lockable resource (for example a seat such as `A1`).
///
/// Resources sort by their string value, which is the order used by
/// listings.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Parses a resource id, rejecting empty or whitespace-only input.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::InvalidInput`] if `value` is blank.
    pub fn parse(value: impl Into<String>) -> Result<Self, ReservationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ReservationError::InvalidInput {
                field: "resource",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(Self(value))
    }

    /// The id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ResourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identity of whoever requests or owns a hold.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolderId(String);

impl HolderId {
    /// Parses a holder id, rejecting empty or whitespace-only input.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::InvalidInput`] if `value` is blank.
    pub fn parse(value: impl Into<String>) -> Result<Self, ReservationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ReservationError::InvalidInput {
                field: "holder",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(Self(value))
    }

    /// The id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds a venue universe of `rows × columns` seats named `<row><column>`,
/// e.g. `A1`, `A2`, ..., `E5` for rows `ABCDE` and five columns.
///
/// Columns are numbered from 1. Duplicate row labels are kept as given; the
/// table rejects duplicates when it is built.
#[must_use]
pub fn seat_grid(rows: &[char], columns: u32) -> Vec<ResourceId> {
    rows.iter()
        .flat_map(|row| (1..=columns).map(move |column| ResourceId(format!("{row}{column}"))))
        .collect()
}

// ============================================================================
// Reservation state
// ============================================================================

/// The reservation state of a single resource.
///
/// Exactly one of these holds for every resource at any instant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReservationState {
    /// No hold, no commitment
    Available,
    /// Temporary exclusive hold
    Held {
        /// Who owns the hold
        holder: HolderId,
        /// When the hold lapses unless confirmed
        expires_at: DateTime<Utc>,
    },
    /// Permanent and terminal
    Committed,
}

impl ReservationState {
    /// Whether a `Held` state has reached its expiry at `now`.
    ///
    /// A hold is considered lapsed from `expires_at` onwards.
    #[must_use]
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        matches!(self, Self::Held { expires_at, .. } if now >= *expires_at)
    }

    /// The current holder, if the resource is held.
    #[must_use]
    pub const fn holder(&self) -> Option<&HolderId> {
        match self {
            Self::Held { holder, .. } => Some(holder),
            Self::Available | Self::Committed => None,
        }
    }

    /// Short status label, matching the serialized `status` tag.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Held { .. } => "held",
            Self::Committed => "committed",
        }
    }
}

impl fmt::Display for ReservationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Held { holder, expires_at } => {
                write!(f, "held by {holder} until {}", expires_at.to_rfc3339())
            },
            Self::Available | Self::Committed => f.write_str(self.label()),
        }
    }
}

/// A hold that lapsed without being confirmed.
///
/// Kept on the record until the next grant so a late confirmation can be told
/// apart from a confirmation by a stranger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LapsedHold {
    /// Holder of the lapsed hold
    pub holder: HolderId,
    /// When it lapsed
    pub expired_at: DateTime<Utc>,
}

/// One resource and everything the table knows about it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reservation {
    /// The resource this record belongs to
    pub resource: ResourceId,
    /// Current state
    pub state: ReservationState,
    /// Most recent unconfirmed hold that lapsed, cleared on the next grant
    pub lapsed: Option<LapsedHold>,
}

impl Reservation {
    /// Creates an `Available` record.
    #[must_use]
    pub const fn new(resource: ResourceId) -> Self {
        Self {
            resource,
            state: ReservationState::Available,
            lapsed: None,
        }
    }
}

// ============================================================================
// Successful outcomes
// ============================================================================

/// Returned by a successful lock attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockGranted {
    /// Locked resource
    pub resource: ResourceId,
    /// Owner of the hold
    pub holder: HolderId,
    /// When the hold lapses unless confirmed
    pub expires_at: DateTime<Utc>,
    /// `true` when an existing hold by the same holder was refreshed
    pub extended: bool,
}

/// Returned by a successful confirmation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committed {
    /// Committed resource
    pub resource: ResourceId,
    /// Holder that confirmed
    pub holder: HolderId,
    /// When the commitment happened
    pub committed_at: DateTime<Utc>,
}

/// Count of resources per state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationSummary {
    /// Resources with no hold
    pub available: usize,
    /// Resources under an unexpired hold
    pub held: usize,
    /// Resources permanently committed
    pub committed: usize,
}

impl ReservationSummary {
    /// Adds one resource in `state` to the tally.
    pub const fn record(&mut self, state: &ReservationState) {
        match state {
            ReservationState::Available => self.available += 1,
            ReservationState::Held { .. } => self.held += 1,
            ReservationState::Committed => self.committed += 1,
        }
    }

    /// Total number of resources counted
    #[must_use]
    pub const fn total(&self) -> usize {
        self.available + self.held + self.committed
    }
}
