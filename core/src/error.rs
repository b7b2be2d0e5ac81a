//! Error taxonomy for reservation operations.
//!
//! Every variant is an expected outcome the caller can act on. None of them
//! are fatal and the table never retries on the caller's behalf.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::HolderId;

/// Why a reservation operation was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReservationError {
    /// The resource is not part of the table's universe
    #[error("unknown resource {resource}")]
    UnknownResource {
        /// Requested resource id
        resource: String,
    },

    /// The resource has been committed and can never change again
    #[error("resource {resource} is already committed")]
    AlreadyCommitted {
        /// Requested resource id
        resource: String,
    },

    /// Another holder owns an unexpired hold on the resource
    #[error("resource {resource} is held by {holder}")]
    HeldByOther {
        /// Requested resource id
        resource: String,
        /// Current owner of the hold
        holder: HolderId,
        /// When the current hold lapses
        expires_at: DateTime<Utc>,
    },

    /// Confirmation attempted without owning the hold
    #[error("resource {resource} is not held by you")]
    NotHeldByYou {
        /// Requested resource id
        resource: String,
        /// Current owner, if someone else holds it
        current_holder: Option<HolderId>,
    },

    /// The caller's hold lapsed before it was confirmed
    #[error("hold on {resource} expired at {}", .expired_at.to_rfc3339())]
    Expired {
        /// Requested resource id
        resource: String,
        /// When the hold lapsed
        expired_at: DateTime<Utc>,
    },

    /// A required input was empty or malformed
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        /// Which input was rejected
        field: &'static str,
        /// What was wrong with it
        reason: String,
    },
}

/// Why a hold TTL cannot back a reservation environment.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldTtlError {
    /// Holds must last some time
    #[error("hold TTL must be greater than zero")]
    Zero,

    /// Too long to add to a timestamp
    #[error("hold TTL is out of range")]
    OutOfRange,
}

impl ReservationError {
    /// Stable machine-readable code, suitable for response bodies and metric labels.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownResource { .. } => "unknown_resource",
            Self::AlreadyCommitted { .. } => "already_committed",
            Self::HeldByOther { .. } => "held_by_other",
            Self::NotHeldByYou { .. } => "not_held_by_you",
            Self::Expired { .. } => "expired",
            Self::InvalidInput { .. } => "invalid_input",
        }
    }
}
