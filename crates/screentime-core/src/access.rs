//! Block and unblock sequencing
//!
//! Blocking is two steps (OS call, then record update) and both the
//! enforcement loop and operator commands can start one. [`AccessControl`]
//! runs each sequence under one async gate so a block is issued at most once
//! per Active -> Blocked transition.

use screentime_api::TimeBudget;
use screentime_host_api::Enforcer;
use screentime_store::{AuditEventType, BlockTrigger};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::budget::{BudgetStore, BudgetUpdate};

/// Result of a block attempt
#[derive(Debug)]
pub enum BlockOutcome {
    /// The user was blocked by this call
    Blocked(BudgetUpdate),

    /// Already blocked or budget not exhausted
    NotNeeded(TimeBudget),
}

/// Result of an unlock attempt
#[derive(Debug)]
pub enum UnlockOutcome {
    Unlocked(BudgetUpdate),
    NotBlocked(TimeBudget),
}

pub struct AccessControl {
    user: String,
    enforcer: Arc<dyn Enforcer>,
    gate: Mutex<()>,
}

impl AccessControl {
    pub fn new(user: impl Into<String>, enforcer: Arc<dyn Enforcer>) -> Self {
        Self {
            user: user.into(),
            enforcer,
            gate: Mutex::new(()),
        }
    }

    /// Block the user if the budget is exhausted and not yet blocked.
    ///
    /// An enforcer failure is logged and the record still moves to blocked.
    pub async fn block_if_exhausted(
        &self,
        budget: &BudgetStore,
        trigger: BlockTrigger,
    ) -> BlockOutcome {
        let _gate = self.gate.lock().await;

        let current = budget.get();
        if current.blocked || !current.is_exhausted() {
            return BlockOutcome::NotNeeded(current);
        }

        info!(
            user = %self.user,
            used = current.used_minutes,
            limit = current.daily_limit_minutes,
            ?trigger,
            "Budget exhausted, blocking"
        );
        if let Err(e) = self.enforcer.block(&self.user).await {
            warn!(user = %self.user, enforcer = self.enforcer.name(), error = %e, "Block failed");
        }

        let update = budget.set_blocked(true);
        budget.audit(AuditEventType::UserBlocked {
            used_minutes: update.budget.used_minutes,
            limit_minutes: update.budget.daily_limit_minutes,
            trigger,
        });
        BlockOutcome::Blocked(update)
    }

    /// Lift an active block. Does nothing, not even an OS call, when the
    /// record is not blocked.
    pub async fn unlock(&self, budget: &BudgetStore) -> UnlockOutcome {
        let _gate = self.gate.lock().await;

        let current = budget.get();
        if !current.blocked {
            return UnlockOutcome::NotBlocked(current);
        }

        info!(user = %self.user, "Unlocking on operator request");
        if let Err(e) = self.enforcer.unblock(&self.user).await {
            warn!(user = %self.user, enforcer = self.enforcer.name(), error = %e, "Unblock failed");
        }

        let update = budget.set_blocked(false);
        budget.audit(AuditEventType::UserUnblocked {
            used_minutes: update.budget.used_minutes,
            limit_minutes: update.budget.daily_limit_minutes,
        });
        UnlockOutcome::Unlocked(update)
    }

    /// Lift the OS block left over from a blocked day that has rolled over.
    ///
    /// A failed unblock is retried on the next call. A block issued on the
    /// new day cancels the restore. Returns true once access is restored.
    pub async fn restore_after_rollover(&self, budget: &BudgetStore) -> bool {
        let _gate = self.gate.lock().await;

        if !budget.take_restore_request() {
            return false;
        }

        info!(user = %self.user, "New day, restoring access");
        if let Err(e) = self.enforcer.unblock(&self.user).await {
            warn!(
                user = %self.user,
                enforcer = self.enforcer.name(),
                error = %e,
                "Unblock failed, retrying next tick"
            );
            budget.rearm_restore_request();
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use screentime_host_api::MockEnforcer;
    use screentime_store::{SqliteStore, Store};
    use screentime_util::ManualClock;

    struct Fixture {
        budget: BudgetStore,
        access: AccessControl,
        enforcer: Arc<MockEnforcer>,
        store: Arc<SqliteStore>,
        clock: Arc<ManualClock>,
    }

    fn fixture(limit: u32) -> Fixture {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let clock = Arc::new(ManualClock::at_noon(NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()));
        let enforcer = Arc::new(MockEnforcer::new());
        Fixture {
            budget: BudgetStore::load(store.clone(), clock.clone(), limit),
            access: AccessControl::new("kid", enforcer.clone()),
            enforcer,
            store,
            clock,
        }
    }

    #[tokio::test]
    async fn blocks_only_when_exhausted() {
        let f = fixture(10);
        f.budget.accrue(9);

        let outcome = f.access.block_if_exhausted(&f.budget, BlockTrigger::LimitReached).await;
        assert!(matches!(outcome, BlockOutcome::NotNeeded(_)));
        assert_eq!(f.enforcer.block_count(), 0);

        f.budget.accrue(1);
        let outcome = f.access.block_if_exhausted(&f.budget, BlockTrigger::LimitReached).await;
        assert!(matches!(outcome, BlockOutcome::Blocked(ref u) if u.budget.blocked));
        assert_eq!(f.enforcer.block_count(), 1);

        // Second attempt is a no-op
        let outcome = f.access.block_if_exhausted(&f.budget, BlockTrigger::LimitReached).await;
        assert!(matches!(outcome, BlockOutcome::NotNeeded(_)));
        assert_eq!(f.enforcer.block_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_blocks_issue_one_call() {
        let f = Arc::new(fixture(5));
        f.budget.accrue(5);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let f = f.clone();
            handles.push(tokio::spawn(async move {
                f.access.block_if_exhausted(&f.budget, BlockTrigger::LimitReduced).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(f.enforcer.block_count(), 1);
        assert!(f.budget.get().blocked);
    }

    #[tokio::test]
    async fn enforcer_failure_still_marks_blocked() {
        let f = fixture(1);
        f.enforcer.set_failing(true);
        f.budget.accrue(1);

        let outcome = f.access.block_if_exhausted(&f.budget, BlockTrigger::LimitReached).await;
        assert!(matches!(outcome, BlockOutcome::Blocked(_)));
        assert!(f.budget.get().blocked);

        let audits = f.store.get_recent_audits(1).unwrap();
        assert!(matches!(
            audits[0].event,
            AuditEventType::UserBlocked { trigger: BlockTrigger::LimitReached, .. }
        ));
    }

    #[tokio::test]
    async fn unlock_when_not_blocked_makes_no_call() {
        let f = fixture(30);
        let outcome = f.access.unlock(&f.budget).await;
        assert!(matches!(outcome, UnlockOutcome::NotBlocked(_)));
        assert_eq!(f.enforcer.unblock_count(), 0);
    }

    #[tokio::test]
    async fn unlock_clears_block_without_touching_usage() {
        let f = fixture(30);
        f.budget.accrue(30);
        f.access.block_if_exhausted(&f.budget, BlockTrigger::LimitReached).await;

        let outcome = f.access.unlock(&f.budget).await;
        let UnlockOutcome::Unlocked(update) = outcome else {
            panic!("expected unlock");
        };
        assert!(!update.budget.blocked);
        assert_eq!(update.budget.used_minutes, 30);
        assert_eq!(update.budget.daily_limit_minutes, 30);
        assert_eq!(f.enforcer.unblock_count(), 1);
    }

    #[tokio::test]
    async fn rollover_restore_runs_once() {
        let f = fixture(1);
        f.budget.accrue(1);
        f.access.block_if_exhausted(&f.budget, BlockTrigger::LimitReached).await;

        assert!(!f.access.restore_after_rollover(&f.budget).await);

        f.clock.advance(Duration::days(1));
        assert!(f.access.restore_after_rollover(&f.budget).await);
        assert!(!f.access.restore_after_rollover(&f.budget).await);
        assert_eq!(f.enforcer.unblock_count(), 1);
    }

    #[tokio::test]
    async fn failed_restore_is_retried() {
        let f = fixture(1);
        f.budget.accrue(1);
        f.access.block_if_exhausted(&f.budget, BlockTrigger::LimitReached).await;

        f.clock.advance(Duration::days(1));
        f.enforcer.set_failing(true);
        assert!(!f.access.restore_after_rollover(&f.budget).await);
        assert_eq!(f.enforcer.unblock_count(), 1);

        f.enforcer.set_failing(false);
        assert!(f.access.restore_after_rollover(&f.budget).await);
        assert_eq!(f.enforcer.unblock_count(), 2);
        assert!(!f.access.restore_after_rollover(&f.budget).await);
    }

    #[tokio::test]
    async fn block_on_new_day_cancels_restore() {
        let f = fixture(1);
        f.budget.accrue(1);
        f.access.block_if_exhausted(&f.budget, BlockTrigger::LimitReached).await;

        f.clock.advance(Duration::days(1));
        f.budget.adjust_limit(-1);
        let outcome = f.access.block_if_exhausted(&f.budget, BlockTrigger::LimitReduced).await;
        assert!(matches!(outcome, BlockOutcome::Blocked(_)));

        assert!(!f.access.restore_after_rollover(&f.budget).await);
        assert_eq!(f.enforcer.unblock_count(), 0);
        assert_eq!(f.enforcer.block_count(), 2);
        assert!(f.budget.get().blocked);
    }
}
