//! Store trait definitions

use screentime_api::TimeBudget;

use crate::{AuditEvent, StoreResult};

/// Durable storage for the budget record and audit log.
///
/// Implementations do not coordinate concurrent writers of the budget
/// record; callers serialize `save_budget` themselves.
pub trait Store: Send + Sync {
    // Budget record

    /// Load the persisted record, `None` if nothing was saved yet
    fn load_budget(&self) -> StoreResult<Option<TimeBudget>>;

    /// Durably replace the persisted record
    fn save_budget(&self, budget: &TimeBudget) -> StoreResult<()>;

    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;
}
