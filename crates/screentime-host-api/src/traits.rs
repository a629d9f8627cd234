//! Host capability traits

use async_trait::async_trait;
use thiserror::Error;

/// Errors from host operations
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HostError {
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }
}

pub type HostResult<T> = Result<T, HostError>;

/// Answers whether the monitored user currently has a session.
///
/// Implementations hold no shared mutable state and may be queried
/// concurrently.
#[async_trait]
pub trait SessionMonitor: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    async fn is_logged_in(&self, user: &str) -> HostResult<bool>;
}

/// Revokes and restores the monitored user's access.
#[async_trait]
pub trait Enforcer: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Revoke access and end any running session
    async fn block(&self, user: &str) -> HostResult<()>;

    /// Restore access
    async fn unblock(&self, user: &str) -> HostResult<()>;
}
