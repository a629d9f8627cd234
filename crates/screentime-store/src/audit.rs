//! Audit event types

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// What caused a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockTrigger {
    /// Usage reached the limit during enforcement
    LimitReached,
    /// The operator lowered the limit below usage
    LimitReduced,
}

/// Types of audit events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// A new day began and the budget was reset
    DayRolledOver {
        day: NaiveDate,
        previous_day: NaiveDate,
        previous_used_minutes: u32,
        was_blocked: bool,
    },

    /// Operator changed today's limit
    LimitAdjusted { delta_minutes: i64, new_limit: u32 },

    /// Access was revoked
    UserBlocked {
        used_minutes: u32,
        limit_minutes: u32,
        trigger: BlockTrigger,
    },

    /// Access was restored by the operator
    UserUnblocked { used_minutes: u32, limit_minutes: u32 },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: screentime_util::now(),
            event,
        }
    }
}
