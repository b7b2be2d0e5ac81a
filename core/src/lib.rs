//! # Seatlock Core
//!
//! Core traits and types for the Seatlock reservation lock table.
//!
//! The lock table is split the same way every component in this workspace is
//! split: a pure state machine here, and an imperative shell in
//! `seatlock-runtime` that owns the records, serializes access to them and
//! executes the side effects the state machine asks for.
//!
//! ## Core Concepts
//!
//! - **State**: one [`types::Reservation`] record per resource
//! - **Action**: [`reservation::ReservationAction`], every input a record can receive
//! - **Reducer**: `(State, Action, Environment) → Result<(Output, Effects), Error>`
//! - **Effect**: descriptions of timer work (schedule an expiry, cancel it), never executed here
//! - **Environment**: injected [`environment::Clock`] and the hold TTL
//!
//! ## Example
//!
//! ```
//! use seatlock_core::environment::SystemClock;
//! use seatlock_core::reducer::Reducer;
//! use seatlock_core::reservation::{ReservationAction, ReservationEnvironment, ReservationReducer};
//! use seatlock_core::types::{HolderId, Reservation, ResourceId};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let env = ReservationEnvironment::new(SystemClock, Duration::from_secs(60))?;
//! let mut record = Reservation::new(ResourceId::parse("A1")?);
//!
//! let reduced = ReservationReducer::new().reduce(
//!     &mut record,
//!     ReservationAction::TryLock { holder: HolderId::parse("alice")? },
//!     &env,
//! )?;
//! assert_eq!(record.state.holder().map(HolderId::as_str), Some("alice"));
//! assert_eq!(reduced.effects.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod reservation;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use error::{HoldTtlError, ReservationError};
pub use smallvec::SmallVec;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// Effects returned by a single reduction.
    ///
    /// Most transitions produce zero or one effect, so they stay inline.
    pub type Effects<Action> = SmallVec<[Effect<Action>; 2]>;

    /// A successful reduction: the value handed back to the caller, plus the
    /// effects the runtime must execute.
    #[derive(Debug)]
    pub struct Reduced<Output, Action> {
        /// Value returned to whoever dispatched the action
        pub output: Output,
        /// Side effects to execute after the state change
        pub effects: Effects<Action>,
    }

    impl<Output, Action> Reduced<Output, Action> {
        /// A reduction with no side effects
        #[must_use]
        pub fn pure(output: Output) -> Self {
            Self {
                output,
                effects: SmallVec::new(),
            }
        }

        /// A reduction with the given effects
        #[must_use]
        pub const fn with_effects(output: Output, effects: Effects<Action>) -> Self {
            Self { output, effects }
        }
    }

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    /// - `Output`: What a successful reduction reports back
    /// - `Error`: Why a reduction was refused
    ///
    /// A refused action may still have mutated `state` (for example a lazy
    /// expiry observed on the way to the refusal); the state is always left
    /// consistent.
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Value returned on success
        type Output;

        /// Error returned when the action is refused
        type Error;

        /// Reduce an action into state changes and effects
        ///
        /// # Errors
        ///
        /// Returns `Self::Error` when the action is not valid for the current state.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<Reduced<Self::Output, Self::Action>, Self::Error>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution). Each effect is scoped to the record the
/// reducer ran against, which owns at most one pending delayed action.
pub mod effect {
    use std::time::Duration;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the runtime.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Dispatch `action` back to the same record after `duration`.
        ///
        /// Replaces any delayed action already pending for the record.
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after delay
            action: Box<Action>,
        },

        /// Cancel the record's pending delayed action, if any
        Cancel,
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use seatlock_core::environment::{Clock, SystemClock};
    ///
    /// let before = SystemClock.now();
    /// assert!(SystemClock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    impl<C: Clock + ?Sized> Clock for Arc<C> {
        fn now(&self) -> DateTime<Utc> {
            (**self).now()
        }
    }
}
