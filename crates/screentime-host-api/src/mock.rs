//! Mock host capabilities for testing

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::{Enforcer, HostError, HostResult, SessionMonitor};

/// Session monitor with a switchable answer
#[derive(Debug, Default)]
pub struct MockMonitor {
    logged_in: AtomicBool,
    fail: AtomicBool,
    queries: AtomicUsize,
}

impl MockMonitor {
    pub fn new(logged_in: bool) -> Self {
        Self {
            logged_in: AtomicBool::new(logged_in),
            ..Default::default()
        }
    }

    pub fn set_logged_in(&self, logged_in: bool) {
        self.logged_in.store(logged_in, Ordering::SeqCst);
    }

    /// Configure queries to fail
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionMonitor for MockMonitor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn is_logged_in(&self, _user: &str) -> HostResult<bool> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(HostError::command("mock", "Mock query failure"));
        }
        Ok(self.logged_in.load(Ordering::SeqCst))
    }
}

/// Enforcer that counts calls instead of touching the system
#[derive(Debug, Default)]
pub struct MockEnforcer {
    blocks: AtomicUsize,
    unblocks: AtomicUsize,
    fail: AtomicBool,
}

impl MockEnforcer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure block/unblock to fail (calls are still counted)
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn block_count(&self) -> usize {
        self.blocks.load(Ordering::SeqCst)
    }

    pub fn unblock_count(&self) -> usize {
        self.unblocks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Enforcer for MockEnforcer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn block(&self, _user: &str) -> HostResult<()> {
        self.blocks.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(HostError::command("mock", "Mock block failure"));
        }
        Ok(())
    }

    async fn unblock(&self, _user: &str) -> HostResult<()> {
        self.unblocks.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(HostError::command("mock", "Mock unblock failure"));
        }
        Ok(())
    }
}
