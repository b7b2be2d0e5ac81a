//! The per-resource reservation state machine.
//!
//! ```text
//! Available --TryLock(h)--> Held(h, t)
//! Held(h,t) --TryLock(h), t not expired--> Held(h, t')      (extension)
//! Held(h,t) --TryLock(h2≠h), t not expired--> refused, no transition
//! Held(h,t) --Confirm(h), t not expired--> Committed
//! Held(h,t) --t expired (lazy check or Expire)--> Available
//! Committed --any action--> refused, no transition         (terminal)
//! ```
//!
//! Every grant asks the runtime for a delayed [`ReservationAction::Expire`]
//! carrying the hold's `(holder, expires_at)` pair. When it fires it only
//! releases the record if that exact hold is still in place, so a timer that
//! outlived its hold (confirmed, extended, or replaced) is harmless.

use chrono::{DateTime, TimeDelta, Utc};
use smallvec::smallvec;
use std::marker::PhantomData;
use std::time::Duration;

use crate::effect::Effect;
use crate::environment::Clock;
use crate::error::{HoldTtlError, ReservationError};
use crate::reducer::{Reduced, Reducer};
use crate::types::{Committed, HolderId, LapsedHold, LockGranted, Reservation, ReservationState};

/// Inputs to a reservation record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReservationAction {
    /// Acquire or extend a hold
    TryLock {
        /// Requesting holder
        holder: HolderId,
    },

    /// Turn a hold into a permanent commitment
    Confirm {
        /// Holder confirming
        holder: HolderId,
    },

    /// Scheduled expiry of a specific hold
    Expire {
        /// Holder the timer was armed for
        holder: HolderId,
        /// Expiry the timer was armed for
        expires_at: DateTime<Utc>,
    },

    /// Apply lazy expiry before a read
    Refresh,
}

/// What a successful reduction produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReservationOutcome {
    /// A hold was granted or extended
    Granted(LockGranted),
    /// A hold was committed
    Committed(Committed),
    /// A lapsed hold was released back to `Available`
    Released(LapsedHold),
    /// Nothing changed
    Unchanged,
}

/// Dependencies of the reservation reducer.
#[derive(Debug, Clone)]
pub struct ReservationEnvironment<C: Clock> {
    /// Source of "now"
    pub clock: C,
    hold_ttl: Duration,
    hold_delta: TimeDelta,
}

impl<C: Clock> ReservationEnvironment<C> {
    /// Creates an environment granting holds of `hold_ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`HoldTtlError`] if the TTL is zero or too large to add to a
    /// timestamp.
    pub fn new(clock: C, hold_ttl: Duration) -> Result<Self, HoldTtlError> {
        if hold_ttl.is_zero() {
            return Err(HoldTtlError::Zero);
        }
        let hold_delta = TimeDelta::from_std(hold_ttl).map_err(|_| HoldTtlError::OutOfRange)?;
        Ok(Self {
            clock,
            hold_ttl,
            hold_delta,
        })
    }

    /// Duration of every hold
    #[must_use]
    pub const fn hold_ttl(&self) -> Duration {
        self.hold_ttl
    }

    // Saturates at the end of the representable range.
    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.hold_delta)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Reducer for a single [`Reservation`] record.
///
/// Generic over the Clock type C to work with any clock implementation.
#[derive(Debug)]
pub struct ReservationReducer<C> {
    _phantom: PhantomData<fn() -> C>,
}

impl<C> ReservationReducer<C> {
    /// Create a new reservation reducer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<C> Default for ReservationReducer<C> {
    fn default() -> Self {
        Self::new()
    }
}

type Transition<T> = Result<Reduced<T, ReservationAction>, ReservationError>;

impl<C: Clock> ReservationReducer<C> {
    /// Acquire or extend a hold for `holder`.
    ///
    /// # Errors
    ///
    /// [`ReservationError::AlreadyCommitted`] or [`ReservationError::HeldByOther`].
    pub fn try_lock(
        &self,
        record: &mut Reservation,
        holder: HolderId,
        env: &ReservationEnvironment<C>,
    ) -> Transition<LockGranted> {
        let now = env.clock.now();
        Self::release_if_lapsed(record, now);

        let extended = match &record.state {
            ReservationState::Committed => {
                return Err(ReservationError::AlreadyCommitted {
                    resource: record.resource.to_string(),
                });
            },
            ReservationState::Held {
                holder: current,
                expires_at,
            } if *current != holder => {
                return Err(ReservationError::HeldByOther {
                    resource: record.resource.to_string(),
                    holder: current.clone(),
                    expires_at: *expires_at,
                });
            },
            ReservationState::Held { .. } => true,
            ReservationState::Available => false,
        };

        let expires_at = env.expiry_from(now);
        record.state = ReservationState::Held {
            holder: holder.clone(),
            expires_at,
        };
        record.lapsed = None;

        let granted = LockGranted {
            resource: record.resource.clone(),
            holder: holder.clone(),
            expires_at,
            extended,
        };
        Ok(Reduced::with_effects(
            granted,
            smallvec![Effect::Delay {
                duration: env.hold_ttl,
                action: Box::new(ReservationAction::Expire { holder, expires_at }),
            }],
        ))
    }

    /// Commit the hold owned by `holder`.
    ///
    /// # Errors
    ///
    /// [`ReservationError::AlreadyCommitted`], [`ReservationError::NotHeldByYou`]
    /// or [`ReservationError::Expired`].
    pub fn confirm(
        &self,
        record: &mut Reservation,
        holder: HolderId,
        env: &ReservationEnvironment<C>,
    ) -> Transition<Committed> {
        let now = env.clock.now();
        Self::release_if_lapsed(record, now);

        match &record.state {
            ReservationState::Committed => Err(ReservationError::AlreadyCommitted {
                resource: record.resource.to_string(),
            }),
            ReservationState::Held { holder: current, .. } if *current == holder => {
                record.state = ReservationState::Committed;
                record.lapsed = None;
                Ok(Reduced::with_effects(
                    Committed {
                        resource: record.resource.clone(),
                        holder,
                        committed_at: now,
                    },
                    smallvec![Effect::Cancel],
                ))
            },
            ReservationState::Held { holder: current, .. } => Err(ReservationError::NotHeldByYou {
                resource: record.resource.to_string(),
                current_holder: Some(current.clone()),
            }),
            ReservationState::Available => match &record.lapsed {
                Some(lapsed) if lapsed.holder == holder => Err(ReservationError::Expired {
                    resource: record.resource.to_string(),
                    expired_at: lapsed.expired_at,
                }),
                _ => Err(ReservationError::NotHeldByYou {
                    resource: record.resource.to_string(),
                    current_holder: None,
                }),
            },
        }
    }

    /// Release the record if `(holder, expires_at)` is still the hold in place
    /// and the environment's clock has reached `expires_at`.
    ///
    /// A timer that fires early by the clock's reckoning re-arms itself for
    /// the remaining time. Returns the released hold, or `None` when nothing
    /// was released.
    pub fn expire(
        &self,
        record: &mut Reservation,
        holder: &HolderId,
        expires_at: DateTime<Utc>,
        env: &ReservationEnvironment<C>,
    ) -> Reduced<Option<LapsedHold>, ReservationAction> {
        let armed_for_this_hold = matches!(
            &record.state,
            ReservationState::Held { holder: current, expires_at: current_expiry }
                if current == holder && *current_expiry == expires_at
        );
        if !armed_for_this_hold {
            return Reduced::pure(None);
        }

        let now = env.clock.now();
        if now < expires_at {
            let remaining = (expires_at - now).to_std().unwrap_or_default();
            return Reduced::with_effects(
                None,
                smallvec![Effect::Delay {
                    duration: remaining,
                    action: Box::new(ReservationAction::Expire {
                        holder: holder.clone(),
                        expires_at,
                    }),
                }],
            );
        }

        let lapsed = LapsedHold {
            holder: holder.clone(),
            expired_at: expires_at,
        };
        record.state = ReservationState::Available;
        record.lapsed = Some(lapsed.clone());
        Reduced::pure(Some(lapsed))
    }

    /// Apply lazy expiry ahead of a read.
    pub fn refresh(
        &self,
        record: &mut Reservation,
        env: &ReservationEnvironment<C>,
    ) -> Reduced<Option<LapsedHold>, ReservationAction> {
        match Self::release_if_lapsed(record, env.clock.now()) {
            Some(lapsed) => Reduced::with_effects(Some(lapsed), smallvec![Effect::Cancel]),
            None => Reduced::pure(None),
        }
    }

    /// Lazy expiry: a hold past its deadline is treated as never having blocked anyone.
    fn release_if_lapsed(record: &mut Reservation, now: DateTime<Utc>) -> Option<LapsedHold> {
        let ReservationState::Held { holder, expires_at } = &record.state else {
            return None;
        };
        if now < *expires_at {
            return None;
        }
        let lapsed = LapsedHold {
            holder: holder.clone(),
            expired_at: *expires_at,
        };
        record.state = ReservationState::Available;
        record.lapsed = Some(lapsed.clone());
        Some(lapsed)
    }
}

impl<C: Clock> Reducer for ReservationReducer<C> {
    type State = Reservation;
    type Action = ReservationAction;
    type Environment = ReservationEnvironment<C>;
    type Output = ReservationOutcome;
    type Error = ReservationError;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Transition<ReservationOutcome> {
        let released = |reduced: Reduced<Option<LapsedHold>, ReservationAction>| {
            let output = reduced.output.map_or(ReservationOutcome::Unchanged, ReservationOutcome::Released);
            Reduced::with_effects(output, reduced.effects)
        };

        match action {
            ReservationAction::TryLock { holder } => self.try_lock(state, holder, env).map(|reduced| {
                Reduced::with_effects(ReservationOutcome::Granted(reduced.output), reduced.effects)
            }),
            ReservationAction::Confirm { holder } => self.confirm(state, holder, env).map(|reduced| {
                Reduced::with_effects(ReservationOutcome::Committed(reduced.output), reduced.effects)
            }),
            ReservationAction::Expire { holder, expires_at } => {
                Ok(released(self.expire(state, &holder, expires_at, env)))
            },
            ReservationAction::Refresh => Ok(released(self.refresh(state, env))),
        }
    }
}
