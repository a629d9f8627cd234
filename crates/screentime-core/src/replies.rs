//! Operator-facing reply text

use screentime_api::TimeBudget;
use screentime_store::StoreError;
use screentime_util::{format_clock_time, format_day};

/// Sent to the operator when the service comes up
pub const STARTED_NOTICE: &str = "Screen time control started\n\n\
The bot is active. Send /status to check usage.";

/// Sent to the operator on graceful shutdown
pub const STOPPED_NOTICE: &str = "Screen time control stopped\n\n\
The bot is no longer active and usage is not being tracked.";

pub fn status_reply(user: &str, budget: &TimeBudget) -> String {
    let state = if budget.blocked { "blocked" } else { "active" };
    format!(
        "Screen time status\n\n\
         User: {user}\n\
         Date: {day}\n\n\
         Used: {used} min / {limit} min\n\
         Remaining: {remaining} min\n\
         Usage: {percent:.1}%\n\n\
         State: {state}\n\
         Last check: {last_check}",
        day = format_day(budget.day),
        used = budget.used_minutes,
        limit = budget.daily_limit_minutes,
        remaining = budget.remaining_minutes(),
        percent = budget.usage_percent(),
        last_check = format_clock_time(&budget.last_checked_at),
    )
}

fn limit_change_reply(verb: &str, minutes: u32, budget: &TimeBudget) -> String {
    format!(
        "{verb} {minutes} minutes\n\n\
         New limit for today: {limit} min\n\
         Used: {used} min\n\
         Remaining: {remaining} min",
        limit = budget.daily_limit_minutes,
        used = budget.used_minutes,
        remaining = budget.remaining_minutes(),
    )
}

pub fn added_reply(minutes: u32, budget: &TimeBudget) -> String {
    let mut reply = limit_change_reply("Added", minutes, budget);
    if budget.blocked {
        reply.push_str("\n\nThe user is still blocked. Send /unlock to restore access.");
    }
    reply
}

pub fn removed_reply(minutes: u32, budget: &TimeBudget, blocked_now: bool) -> String {
    let mut reply = limit_change_reply("Removed", minutes, budget);
    if blocked_now {
        reply.push_str("\n\nLimit exceeded, user blocked.");
    }
    reply
}

pub fn unlocked_reply(user: &str, budget: &TimeBudget) -> String {
    format!(
        "User {user} unblocked\n\n\
         They can log in again.\n\
         Used: {used}/{limit} min",
        used = budget.used_minutes,
        limit = budget.daily_limit_minutes,
    )
}

pub fn not_blocked_reply(user: &str) -> String {
    format!("User {user} is not blocked.")
}

/// Line appended when the change could not be saved
pub fn persist_warning(error: &StoreError) -> String {
    format!("\n\nWarning: the change is in effect but could not be saved ({error}).")
}
