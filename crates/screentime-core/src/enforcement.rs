//! Periodic accrual and limit enforcement

use screentime_api::TimeBudget;
use screentime_store::BlockTrigger;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::access::BlockOutcome;
use crate::context::ServiceContext;

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// User not logged in (or the query failed)
    NotLoggedIn,

    /// Already blocked today, nothing accrued
    AlreadyBlocked,

    /// One minute accrued, still within the limit
    Accrued(TimeBudget),

    /// This tick exhausted the budget and blocked the user
    Blocked(TimeBudget),
}

pub struct EnforcementLoop {
    ctx: Arc<ServiceContext>,
    interval: Duration,
}

impl EnforcementLoop {
    pub fn new(ctx: Arc<ServiceContext>, interval: Duration) -> Self {
        Self { ctx, interval }
    }

    /// Run one enforcement step.
    pub async fn tick(&self) -> TickOutcome {
        let ctx = &self.ctx;

        // A block left from a day that has since rolled over
        ctx.access.restore_after_rollover(&ctx.budget).await;

        let logged_in = match ctx.monitor.is_logged_in(&ctx.user).await {
            Ok(logged_in) => logged_in,
            Err(e) => {
                warn!(
                    user = %ctx.user,
                    monitor = ctx.monitor.name(),
                    error = %e,
                    "Session query failed, treating as logged out"
                );
                false
            }
        };
        if !logged_in {
            debug!(user = %ctx.user, "Not logged in");
            return TickOutcome::NotLoggedIn;
        }

        let Some(update) = ctx.budget.accrue(1) else {
            debug!(user = %ctx.user, "Already blocked");
            return TickOutcome::AlreadyBlocked;
        };
        let snapshot = update.budget;
        debug!(
            used = snapshot.used_minutes,
            limit = snapshot.daily_limit_minutes,
            "Minute accrued"
        );

        if !snapshot.is_exhausted() {
            return TickOutcome::Accrued(snapshot);
        }

        match ctx
            .access
            .block_if_exhausted(&ctx.budget, BlockTrigger::LimitReached)
            .await
        {
            BlockOutcome::Blocked(update) => TickOutcome::Blocked(update.budget),
            // An operator command got there first
            BlockOutcome::NotNeeded(current) if current.blocked => TickOutcome::AlreadyBlocked,
            BlockOutcome::NotNeeded(current) => TickOutcome::Accrued(current),
        }
    }

    /// Tick every interval until `shutdown` flips to true.
    ///
    /// The first tick fires one full interval after start. A tick in
    /// progress always completes before shutdown is observed.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut timer = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            user = %self.ctx.user,
            interval_secs = self.interval.as_secs(),
            monitor = self.ctx.monitor.name(),
            "Enforcement loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }

                _ = timer.tick() => {
                    let outcome = self.tick().await;
                    if let TickOutcome::Blocked(budget) = &outcome {
                        info!(
                            user = %self.ctx.user,
                            used = budget.used_minutes,
                            limit = budget.daily_limit_minutes,
                            "Daily limit reached, user blocked"
                        );
                    }
                }
            }
        }

        info!("Enforcement loop stopped");
    }
}
