//! The budget store
//!
//! [`BudgetStore`] is the only owner of the [`TimeBudget`] record. Every
//! public operation runs as one critical section: roll the day over if the
//! record is stale, apply the change, write it to durable storage, return
//! the resulting snapshot. Nothing else holds a reference to the record.

use screentime_api::TimeBudget;
use screentime_store::{AuditEvent, AuditEventType, Store, StoreError};
use screentime_util::Clock;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Result of a mutating budget operation.
///
/// The mutation is committed in memory regardless of `persist_error`;
/// a failed write is a warning for the caller to surface, not a failure.
#[derive(Debug)]
pub struct BudgetUpdate {
    /// Snapshot after the mutation
    pub budget: TimeBudget,

    /// Set when the durable write failed
    pub persist_error: Option<StoreError>,
}

impl BudgetUpdate {
    pub fn is_durable(&self) -> bool {
        self.persist_error.is_none()
    }
}

struct BudgetState {
    budget: TimeBudget,
    /// A blocked record was rolled over and the OS block still needs lifting
    restore_pending: bool,
}

/// Sole owner of the daily budget record
pub struct BudgetStore {
    state: Mutex<BudgetState>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    default_limit: u32,
}

impl BudgetStore {
    /// Load the persisted record, or start a fresh one for today.
    ///
    /// Missing or unreadable state never fails startup. A stale record is
    /// kept as loaded and rolled over by the first operation.
    pub fn load(store: Arc<dyn Store>, clock: Arc<dyn Clock>, default_limit: u32) -> Self {
        let loaded = match store.load_budget() {
            Ok(Some(budget)) => {
                info!(
                    day = %budget.day,
                    used = budget.used_minutes,
                    limit = budget.daily_limit_minutes,
                    blocked = budget.blocked,
                    "Budget loaded"
                );
                Some(budget)
            }
            Ok(None) => {
                info!("No saved budget, starting fresh");
                None
            }
            Err(e) => {
                warn!(error = %e, "Saved budget unreadable, starting fresh");
                None
            }
        };

        let budget = match loaded {
            Some(budget) => budget,
            None => {
                let fresh = TimeBudget::fresh(clock.today(), default_limit, clock.now());
                if let Err(e) = store.save_budget(&fresh) {
                    warn!(error = %e, "Failed to save initial budget");
                }
                fresh
            }
        };

        Self {
            state: Mutex::new(BudgetState {
                budget,
                restore_pending: false,
            }),
            store,
            clock,
            default_limit,
        }
    }

    /// Consistent snapshot of today's record
    pub fn get(&self) -> TimeBudget {
        let state = self.lock();
        state.budget.clone()
    }

    /// Add accrued minutes unless the record is blocked, checked and
    /// applied in one critical section. Returns `None` when blocked.
    ///
    /// Limit evaluation is left to the caller.
    pub fn accrue(&self, minutes: u32) -> Option<BudgetUpdate> {
        let now = self.clock.now();
        let mut state = self.lock();
        if state.budget.blocked {
            return None;
        }
        Some(self.commit(&mut state, |budget| {
            budget.used_minutes = budget.used_minutes.saturating_add(minutes);
            budget.last_checked_at = now;
        }))
    }

    /// Move today's limit by `delta_minutes`, clamped at zero.
    ///
    /// Does not touch `blocked`.
    pub fn adjust_limit(&self, delta_minutes: i64) -> BudgetUpdate {
        let update = self.mutate(|budget| {
            let adjusted = i64::from(budget.daily_limit_minutes).saturating_add(delta_minutes);
            budget.daily_limit_minutes = adjusted.clamp(0, i64::from(u32::MAX)) as u32;
        });

        self.audit(AuditEventType::LimitAdjusted {
            delta_minutes,
            new_limit: update.budget.daily_limit_minutes,
        });
        update
    }

    /// Record the block state. Blocking counts as a check and drops any
    /// pending restore request, so a fresh block is never lifted by a
    /// leftover rollover.
    pub fn set_blocked(&self, blocked: bool) -> BudgetUpdate {
        let now = self.clock.now();
        let mut state = self.lock();
        if blocked {
            state.restore_pending = false;
        }
        self.commit(&mut state, |budget| {
            budget.blocked = blocked;
            if blocked {
                budget.last_checked_at = now;
            }
        })
    }

    /// Whether a rollover cleared a block whose OS-level effect is still in
    /// place. Returns true at most once per such rollover.
    pub fn take_restore_request(&self) -> bool {
        let mut state = self.lock();
        std::mem::take(&mut state.restore_pending)
    }

    /// Put back a restore request whose unblock did not go through.
    ///
    /// Ignored once the record is blocked again, since the new block
    /// supersedes yesterday's.
    pub fn rearm_restore_request(&self) {
        let mut state = self.lock();
        if !state.budget.blocked {
            state.restore_pending = true;
        }
    }

    /// Append to the audit log; failures are only logged.
    pub fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.store.append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to append audit event");
        }
    }

    /// Take the lock and roll the day over if needed.
    fn lock(&self) -> MutexGuard<'_, BudgetState> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.roll_over(&mut state);
        state
    }

    fn roll_over(&self, state: &mut BudgetState) {
        let today = self.clock.today();
        if !state.budget.is_stale(today) {
            return;
        }

        let last_checked_at = state.budget.last_checked_at;
        let previous = std::mem::replace(
            &mut state.budget,
            TimeBudget {
                day: today,
                used_minutes: 0,
                daily_limit_minutes: self.default_limit,
                blocked: false,
                last_checked_at,
            },
        );
        if previous.blocked {
            state.restore_pending = true;
        }

        info!(
            day = %today,
            previous_day = %previous.day,
            previous_used = previous.used_minutes,
            was_blocked = previous.blocked,
            "New day, budget reset"
        );

        if let Err(e) = self.store.save_budget(&state.budget) {
            warn!(error = %e, "Failed to save budget after rollover");
        }

        self.audit(AuditEventType::DayRolledOver {
            day: today,
            previous_day: previous.day,
            previous_used_minutes: previous.used_minutes,
            was_blocked: previous.blocked,
        });
    }

    fn mutate(&self, change: impl FnOnce(&mut TimeBudget)) -> BudgetUpdate {
        let mut state = self.lock();
        self.commit(&mut state, change)
    }

    /// Apply `change` and save, with the lock already held.
    fn commit(&self, state: &mut BudgetState, change: impl FnOnce(&mut TimeBudget)) -> BudgetUpdate {
        change(&mut state.budget);

        let persist_error = self.store.save_budget(&state.budget).err();
        if let Some(e) = &persist_error {
            warn!(error = %e, "Failed to save budget, continuing in memory");
        }

        debug!(
            used = state.budget.used_minutes,
            limit = state.budget.daily_limit_minutes,
            blocked = state.budget.blocked,
            "Budget updated"
        );

        BudgetUpdate {
            budget: state.budget.clone(),
            persist_error,
        }
    }
}
