//! Shared service state

use screentime_host_api::{Enforcer, SessionMonitor};
use screentime_store::Store;
use screentime_util::Clock;
use std::sync::Arc;

use crate::access::AccessControl;
use crate::budget::BudgetStore;

/// Everything the enforcement loop and command processor share.
///
/// Constructed once at startup and handed to both as `Arc<ServiceContext>`.
pub struct ServiceContext {
    pub user: String,
    pub budget: BudgetStore,
    pub access: AccessControl,
    pub monitor: Arc<dyn SessionMonitor>,
}

impl ServiceContext {
    pub fn new(
        user: impl Into<String>,
        default_limit: u32,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        monitor: Arc<dyn SessionMonitor>,
        enforcer: Arc<dyn Enforcer>,
    ) -> Arc<Self> {
        let user = user.into();
        Arc::new(Self {
            budget: BudgetStore::load(store, clock, default_limit),
            access: AccessControl::new(user.clone(), enforcer),
            monitor,
            user,
        })
    }
}
