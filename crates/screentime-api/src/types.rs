//! The daily time budget record

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Usage budget for the monitored user on a single calendar day.
///
/// Field names on disk match the state files written by earlier releases
/// (`date`, `used_minutes`, `daily_limit`, `is_blocked`, `last_check`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBudget {
    /// Local calendar day this record applies to
    #[serde(rename = "date")]
    pub day: NaiveDate,

    /// Minutes accrued so far today
    pub used_minutes: u32,

    /// Allowance for today, adjustable by the operator
    #[serde(rename = "daily_limit")]
    pub daily_limit_minutes: u32,

    /// Set once enforcement has acted on today's overrun
    #[serde(rename = "is_blocked")]
    pub blocked: bool,

    /// Most recent accrual or blocking decision
    #[serde(rename = "last_check")]
    pub last_checked_at: DateTime<Local>,
}

impl TimeBudget {
    /// A fresh, unblocked record with no usage.
    pub fn fresh(day: NaiveDate, daily_limit_minutes: u32, now: DateTime<Local>) -> Self {
        Self {
            day,
            used_minutes: 0,
            daily_limit_minutes,
            blocked: false,
            last_checked_at: now,
        }
    }

    /// Minutes left before the limit is reached (never negative).
    pub fn remaining_minutes(&self) -> u32 {
        self.daily_limit_minutes.saturating_sub(self.used_minutes)
    }

    /// Whether usage has reached the limit.
    pub fn is_exhausted(&self) -> bool {
        self.used_minutes >= self.daily_limit_minutes
    }

    /// Share of the limit already used, in percent.
    ///
    /// A zero limit reads as fully used.
    pub fn usage_percent(&self) -> f64 {
        if self.daily_limit_minutes == 0 {
            return 100.0;
        }
        f64::from(self.used_minutes) / f64::from(self.daily_limit_minutes) * 100.0
    }

    /// Whether this record belongs to a day other than `today`.
    pub fn is_stale(&self, today: NaiveDate) -> bool {
        self.day != today
    }
}
