//! The lock table: one mutex-guarded record per resource.
//!
//! The resource map is built once and never changes shape, so looking up a
//! record needs no table-wide lock. Each record's mutex is held for the whole
//! check-then-set sequence of an operation and never across an `.await`.

use seatlock_core::ReservationError;
use seatlock_core::effect::Effect;
use seatlock_core::environment::Clock;
use seatlock_core::reducer::{Effects, Reduced, Reducer};
use seatlock_core::reservation::{
    ReservationAction, ReservationEnvironment, ReservationOutcome, ReservationReducer,
};
use seatlock_core::types::{
    Committed, HolderId, LockGranted, Reservation, ReservationState, ReservationSummary, ResourceId,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, info, trace, warn};

use crate::config::LockTableConfig;
use crate::error::ConfigError;
use crate::metrics::ReservationMetrics;

type Transition<T> = Result<Reduced<T, ReservationAction>, ReservationError>;

/// A scheduled expiry, tagged so a timer that was replaced while it was
/// already firing can recognise itself as stale.
struct PendingExpiry {
    generation: u64,
    handle: AbortHandle,
}

struct Slot {
    record: Reservation,
    timer: Option<PendingExpiry>,
    generation: u64,
}

impl Slot {
    const fn new(resource: ResourceId) -> Self {
        Self {
            record: Reservation::new(resource),
            timer: None,
            generation: 0,
        }
    }

    fn cancel_timer(&mut self) -> bool {
        let Some(pending) = self.timer.take() else {
            return false;
        };
        pending.handle.abort();
        ReservationMetrics::record_timer_cancelled();
        true
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    // Every transition leaves the record consistent before anything that could panic.
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn require_resource(resource: &str) -> Result<(), ReservationError> {
    if resource.trim().is_empty() {
        return Err(ReservationError::InvalidInput {
            field: "resource",
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

struct Inner<C: Clock> {
    records: BTreeMap<ResourceId, Mutex<Slot>>,
    reducer: ReservationReducer<C>,
    env: ReservationEnvironment<C>,
    timers: Option<Handle>,
}

impl<C: Clock + 'static> Inner<C> {
    fn slot(&self, resource: &str) -> Result<&Mutex<Slot>, ReservationError> {
        self.records
            .get(resource)
            .ok_or_else(|| ReservationError::UnknownResource {
                resource: resource.to_string(),
            })
    }

    /// Runs one transition inside the record's critical section and executes
    /// its effects before the lock is released.
    fn run<T>(
        self: &Arc<Self>,
        slot: &Mutex<Slot>,
        operation: &'static str,
        transition: impl FnOnce(&ReservationReducer<C>, &mut Reservation, &ReservationEnvironment<C>) -> Transition<T>,
    ) -> Result<T, ReservationError> {
        let started = Instant::now();
        let mut slot = lock(slot);

        if slot.record.state.is_lapsed(self.env.clock.now()) {
            ReservationMetrics::record_expiration("lazy");
            debug!(resource = %slot.record.resource, "Lapsed hold released on access");
        }

        let result = match transition(&self.reducer, &mut slot.record, &self.env) {
            Ok(Reduced { output, effects }) => {
                self.execute(&mut slot, effects);
                Ok(output)
            },
            Err(err) => {
                // A refusal can still have released a lapsed hold; its timer is now useless.
                if !matches!(slot.record.state, ReservationState::Held { .. }) {
                    slot.cancel_timer();
                }
                Err(err)
            },
        };
        drop(slot);

        ReservationMetrics::record_critical_section(operation, started.elapsed());
        result
    }

    fn execute(self: &Arc<Self>, slot: &mut Slot, effects: Effects<ReservationAction>) {
        for effect in effects {
            match effect {
                Effect::None => {},
                Effect::Delay { duration, action } => self.schedule(slot, duration, *action),
                Effect::Cancel => {
                    if slot.cancel_timer() {
                        trace!(resource = %slot.record.resource, "Expiry timer cancelled");
                    }
                },
            }
        }
    }

    fn schedule(self: &Arc<Self>, slot: &mut Slot, duration: Duration, action: ReservationAction) {
        slot.cancel_timer();
        let Some(runtime) = &self.timers else {
            return;
        };

        slot.generation += 1;
        let generation = slot.generation;
        let resource = slot.record.resource.clone();
        let table = Arc::downgrade(self);

        let task = runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(inner) = table.upgrade() {
                inner.fire(&resource, generation, action);
            }
        });

        slot.timer = Some(PendingExpiry {
            generation,
            handle: task.abort_handle(),
        });
        ReservationMetrics::record_timer_scheduled();
        trace!(resource = %slot.record.resource, ?duration, generation, "Expiry timer scheduled");
    }

    fn fire(self: &Arc<Self>, resource: &ResourceId, generation: u64, action: ReservationAction) {
        let Some(slot) = self.records.get(resource) else {
            return;
        };
        let mut slot = lock(slot);

        if !slot.timer.as_ref().is_some_and(|pending| pending.generation == generation) {
            trace!(%resource, generation, "Superseded expiry timer ignored");
            return;
        }
        slot.timer = None;
        ReservationMetrics::record_timer_fired();

        match self.reducer.reduce(&mut slot.record, action, &self.env) {
            Ok(Reduced {
                output: ReservationOutcome::Released(lapsed),
                effects,
            }) => {
                ReservationMetrics::record_expiration("eager");
                info!(%resource, holder = %lapsed.holder, expired_at = %lapsed.expired_at, "Hold expired");
                self.execute(&mut slot, effects);
            },
            Ok(Reduced { effects, .. }) if effects.is_empty() => {
                trace!(%resource, generation, "Stale expiry timer ignored");
            },
            Ok(Reduced { effects, .. }) => {
                trace!(%resource, generation, "Expiry timer ran ahead of the clock, re-arming");
                self.execute(&mut slot, effects);
            },
            Err(err) => warn!(%resource, error = %err, "Expiry timer refused"),
        }
    }

    fn refresh(
        reducer: &ReservationReducer<C>,
        record: &mut Reservation,
        env: &ReservationEnvironment<C>,
    ) -> Transition<ReservationState> {
        let Reduced { effects, .. } = reducer.refresh(record, env);
        Ok(Reduced::with_effects(record.state.clone(), effects))
    }
}

/// Exclusive, time-limited reservations over a fixed set of resources.
///
/// Cloning is cheap and every clone drives the same table.
///
/// # Concurrency
///
/// Each resource has its own mutex. Operations on different resources never
/// contend, and the check-then-set sequence of an operation runs entirely
/// inside one critical section, so two racing lock attempts can never both
/// observe `Available`.
///
/// # Expiry
///
/// Holds expire lazily: any access at or after `expires_at` treats the hold
/// as gone. When built inside a Tokio runtime with eager expiry enabled, each
/// hold also arms a timer that releases it at `expires_at`; confirming
/// cancels the timer. Timers hold only a weak reference to the table.
pub struct LockTable<C: Clock + 'static> {
    inner: Arc<Inner<C>>,
}

impl<C: Clock + 'static> Clone for LockTable<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Clock + 'static> fmt::Debug for LockTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockTable")
            .field("resources", &self.inner.records.len())
            .field("hold_ttl", &self.inner.env.hold_ttl())
            .field("eager_expiry", &self.inner.timers.is_some())
            .finish_non_exhaustive()
    }
}

impl<C: Clock + 'static> LockTable<C> {
    /// Build a table over `resources`, all initially `Available`.
    ///
    /// Eager expiry needs a Tokio runtime on the calling thread; without one
    /// the table falls back to lazy expiry and logs a warning.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid, the universe
    /// is empty, or a resource appears twice.
    pub fn new(
        resources: impl IntoIterator<Item = ResourceId>,
        clock: C,
        config: LockTableConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let env = ReservationEnvironment::new(clock, config.hold_ttl)?;

        let mut records = BTreeMap::new();
        for resource in resources {
            if records.contains_key(&resource) {
                return Err(ConfigError::DuplicateResource { resource });
            }
            records.insert(resource.clone(), Mutex::new(Slot::new(resource)));
        }
        if records.is_empty() {
            return Err(ConfigError::EmptyUniverse);
        }

        let timers = if config.eager_expiry {
            match Handle::try_current() {
                Ok(handle) => Some(handle),
                Err(_) => {
                    warn!("No Tokio runtime available, eager expiry disabled; holds expire lazily");
                    None
                },
            }
        } else {
            None
        };

        info!(
            resources = records.len(),
            hold_ttl = ?config.hold_ttl,
            eager_expiry = timers.is_some(),
            "Lock table ready"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                records,
                reducer: ReservationReducer::new(),
                env,
                timers,
            }),
        })
    }

    /// Acquire a hold on `resource` for `holder`, or extend the one `holder`
    /// already owns.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::InvalidInput`] for a blank resource or holder
    /// - [`ReservationError::UnknownResource`] outside the universe
    /// - [`ReservationError::AlreadyCommitted`] once committed
    /// - [`ReservationError::HeldByOther`] while someone else's hold is live
    pub fn try_lock(&self, resource: &str, holder: &str) -> Result<LockGranted, ReservationError> {
        let result = require_resource(resource)
            .and_then(|()| HolderId::parse(holder))
            .and_then(|holder| {
                let slot = self.inner.slot(resource)?;
                self.inner.run(slot, "try_lock", |reducer, record, env| {
                    reducer.try_lock(record, holder, env)
                })
            });

        match &result {
            Ok(granted) => {
                ReservationMetrics::record_lock(if granted.extended { "extended" } else { "granted" });
                debug!(
                    resource,
                    holder,
                    expires_at = %granted.expires_at,
                    extended = granted.extended,
                    "Hold granted"
                );
            },
            Err(err) => {
                ReservationMetrics::record_lock(err.code());
                debug!(resource, holder, error = %err, "Lock refused");
            },
        }
        result
    }

    /// Turn `holder`'s live hold on `resource` into a permanent commitment.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::InvalidInput`] for a blank resource or holder
    /// - [`ReservationError::UnknownResource`] outside the universe
    /// - [`ReservationError::AlreadyCommitted`] once committed
    /// - [`ReservationError::NotHeldByYou`] if someone else holds it, or nobody does
    /// - [`ReservationError::Expired`] if `holder`'s hold lapsed first
    pub fn confirm(&self, resource: &str, holder: &str) -> Result<Committed, ReservationError> {
        let result = require_resource(resource)
            .and_then(|()| HolderId::parse(holder))
            .and_then(|holder| {
                let slot = self.inner.slot(resource)?;
                self.inner.run(slot, "confirm", |reducer, record, env| {
                    reducer.confirm(record, holder, env)
                })
            });

        match &result {
            Ok(committed) => {
                ReservationMetrics::record_confirm("committed");
                info!(resource, holder, committed_at = %committed.committed_at, "Reservation committed");
            },
            Err(err) => {
                ReservationMetrics::record_confirm(err.code());
                debug!(resource, holder, error = %err, "Confirmation refused");
            },
        }
        result
    }

    /// Current state of `resource`, after applying lazy expiry.
    ///
    /// # Errors
    ///
    /// [`ReservationError::InvalidInput`] for a blank id,
    /// [`ReservationError::UnknownResource`] outside the universe.
    pub fn status(&self, resource: &str) -> Result<ReservationState, ReservationError> {
        require_resource(resource)?;
        let slot = self.inner.slot(resource)?;
        self.inner.run(slot, "status", Inner::refresh)
    }

    /// Every resource with its state, in ascending resource order.
    ///
    /// Each record is locked only while it is read, so the listing is not a
    /// single atomic snapshot of the whole table.
    #[must_use]
    pub fn list_all(&self) -> Vec<(ResourceId, ReservationState)> {
        self.inner
            .records
            .iter()
            .filter_map(|(resource, slot)| {
                self.inner
                    .run(slot, "status", Inner::refresh)
                    .ok()
                    .map(|state| (resource.clone(), state))
            })
            .collect()
    }

    /// Count of resources per state.
    #[must_use]
    pub fn summary(&self) -> ReservationSummary {
        self.list_all()
            .iter()
            .fold(ReservationSummary::default(), |mut summary, (_, state)| {
                summary.record(state);
                summary
            })
    }

    /// The resource universe, in ascending order.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceId> {
        self.inner.records.keys()
    }

    /// Whether `resource` belongs to the universe.
    #[must_use]
    pub fn contains(&self, resource: &str) -> bool {
        self.inner.records.contains_key(resource)
    }

    /// Number of resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    /// Always `false`: tables are built with at least one resource.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }

    /// TTL granted to every hold.
    #[must_use]
    pub fn hold_ttl(&self) -> Duration {
        self.inner.env.hold_ttl()
    }

    /// Whether holds arm an eager expiry timer.
    #[must_use]
    pub fn eager_expiry(&self) -> bool {
        self.inner.timers.is_some()
    }

    #[cfg(test)]
    fn has_pending_timer(&self, resource: &str) -> bool {
        self.inner
            .records
            .get(resource)
            .is_some_and(|slot| lock(slot).timer.is_some())
    }

    /// State as stored, without applying lazy expiry.
    #[cfg(test)]
    fn stored_state(&self, resource: &str) -> Option<ReservationState> {
        self.inner
            .records
            .get(resource)
            .map(|slot| lock(slot).record.state.clone())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use seatlock_testing::{ManualClock, venue};

    fn table(eager: bool) -> (LockTable<ManualClock>, ManualClock) {
        let clock = ManualClock::starting_at_test_epoch();
        let config = LockTableConfig::default()
            .with_hold_ttl(Duration::from_secs(60))
            .with_eager_expiry(eager);
        (LockTable::new(venue(), clock.clone(), config).unwrap(), clock)
    }

    #[test]
    fn without_runtime_expiry_is_lazy_only() {
        let (table, _) = table(true);
        assert!(!table.eager_expiry());

        table.try_lock("A1", "alice").unwrap();
        assert!(!table.has_pending_timer("A1"));
    }

    #[tokio::test]
    async fn grant_arms_timer_and_confirm_cancels_it() {
        let (table, _) = table(true);
        assert!(table.eager_expiry());

        table.try_lock("A1", "alice").unwrap();
        assert!(table.has_pending_timer("A1"));

        table.confirm("A1", "alice").unwrap();
        assert!(!table.has_pending_timer("A1"));
    }

    #[tokio::test]
    async fn lazy_release_cancels_stale_timer() {
        let (table, clock) = table(true);
        table.try_lock("A1", "alice").unwrap();

        clock.advance(chrono::TimeDelta::seconds(61));
        assert_eq!(table.status("A1").unwrap(), ReservationState::Available);

        assert!(!table.has_pending_timer("A1"));
    }

    #[tokio::test]
    async fn refused_confirm_after_lapse_cancels_timer() {
        let (table, clock) = table(true);
        table.try_lock("A2", "carol").unwrap();

        clock.advance(chrono::TimeDelta::seconds(61));
        assert!(matches!(table.confirm("A2", "carol"), Err(ReservationError::Expired { .. })));

        assert!(!table.has_pending_timer("A2"));
    }

    #[tokio::test]
    async fn refused_lock_keeps_owners_timer() {
        let (table, _) = table(true);
        table.try_lock("A1", "alice").unwrap();

        assert!(table.try_lock("A1", "bob").is_err());

        assert!(table.has_pending_timer("A1"));
    }

    async fn elapse(clock: &ManualClock, seconds: u64) {
        clock.advance(chrono::TimeDelta::seconds(i64::try_from(seconds).unwrap()));
        tokio::time::sleep(Duration::from_secs(seconds)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn extension_replaces_timer() {
        let (table, clock) = table(true);
        table.try_lock("A1", "alice").unwrap();

        elapse(&clock, 30).await;
        table.try_lock("A1", "alice").unwrap();

        // The first timer would have fired at 60 s; the hold must survive it.
        elapse(&clock, 45).await;
        assert!(matches!(table.stored_state("A1"), Some(ReservationState::Held { .. })));

        elapse(&clock, 20).await;
        assert_eq!(table.stored_state("A1"), Some(ReservationState::Available));
        assert!(!table.has_pending_timer("A1"));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_waits_for_table_clock() {
        let (table, clock) = table(true);
        table.try_lock("A1", "alice").unwrap();

        // Timer time passes, the table's clock does not.
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(matches!(table.stored_state("A1"), Some(ReservationState::Held { .. })));
        assert!(table.has_pending_timer("A1"));

        // Catch the clock up; the re-armed timer releases the hold on its own.
        clock.advance(chrono::TimeDelta::seconds(60));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(matches!(table.stored_state("A1"), Some(ReservationState::Held { .. })));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(table.stored_state("A1"), Some(ReservationState::Available));
        assert!(!table.has_pending_timer("A1"));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_table_stops_timers() {
        let (table, _) = table(true);
        table.try_lock("A1", "alice").unwrap();
        drop(table);

        // Nothing left to fire against; this must simply complete.
        tokio::time::sleep(Duration::from_secs(120)).await;
    }
}
