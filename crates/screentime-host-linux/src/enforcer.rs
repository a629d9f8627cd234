//! Access enforcement

use async_trait::async_trait;
use screentime_host_api::{Enforcer, HostResult};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::command::{run_checked, run_command};

/// Environment variable carrying the user name into enforcement scripts
pub const SCRIPT_USER_ENV: &str = "SCREENTIME_USER";

/// Blocks by locking the account and terminating its sessions.
///
/// Requires root: uses `usermod` and `loginctl`.
#[derive(Debug, Default)]
pub struct AccountEnforcer;

impl AccountEnforcer {
    pub fn new() -> Self {
        Self
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl Enforcer for AccountEnforcer {
    fn name(&self) -> &str {
        "account"
    }

    async fn block(&self, user: &str) -> HostResult<()> {
        info!(user = %user, "Locking account");
        let lock = run_checked(&argv(&["usermod", "--lock", user]), &[]).await;

        // Session termination runs even if locking failed.
        let terminate = run_command(&argv(&["loginctl", "terminate-user", user]), &[]).await;
        match &terminate {
            Ok(output) if output.success => info!(user = %user, "Sessions terminated"),
            // loginctl exits non-zero when the user has no sessions
            Ok(output) => debug!(user = %user, stderr = %output.stderr.trim(), "No sessions terminated"),
            Err(e) => warn!(user = %user, error = %e, "Failed to terminate sessions"),
        }

        lock.map(|_| ())
    }

    async fn unblock(&self, user: &str) -> HostResult<()> {
        info!(user = %user, "Unlocking account");
        run_checked(&argv(&["usermod", "--unlock", user]), &[]).await?;
        Ok(())
    }
}

/// Blocks and unblocks by running operator-provided scripts.
///
/// Each script gets the user name as its only argument and in
/// `SCREENTIME_USER`.
#[derive(Debug, Clone)]
pub struct ScriptEnforcer {
    block_script: PathBuf,
    unblock_script: PathBuf,
}

impl ScriptEnforcer {
    pub fn new(block_script: impl Into<PathBuf>, unblock_script: impl Into<PathBuf>) -> Self {
        Self {
            block_script: block_script.into(),
            unblock_script: unblock_script.into(),
        }
    }

    async fn run(&self, script: &PathBuf, user: &str) -> HostResult<()> {
        let argv = vec![script.to_string_lossy().into_owned(), user.to_string()];
        let output = run_checked(&argv, &[(SCRIPT_USER_ENV, user)]).await?;
        debug!(script = %script.display(), stdout = %output.stdout.trim(), "Script finished");
        Ok(())
    }
}

#[async_trait]
impl Enforcer for ScriptEnforcer {
    fn name(&self) -> &str {
        "script"
    }

    async fn block(&self, user: &str) -> HostResult<()> {
        info!(user = %user, script = %self.block_script.display(), "Running block script");
        self.run(&self.block_script, user).await
    }

    async fn unblock(&self, user: &str) -> HostResult<()> {
        info!(user = %user, script = %self.unblock_script.display(), "Running unblock script");
        self.run(&self.unblock_script, user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn scripts_receive_user() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log");
        let block = write_script(
            dir.path(),
            "block.sh",
            &format!("echo \"block $1 $SCREENTIME_USER\" >> {}", log.display()),
        );
        let unblock = write_script(
            dir.path(),
            "unblock.sh",
            &format!("echo \"unblock $1\" >> {}", log.display()),
        );

        let enforcer = ScriptEnforcer::new(block, unblock);
        enforcer.block("kid").await.unwrap();
        enforcer.unblock("kid").await.unwrap();

        let log = std::fs::read_to_string(log).unwrap();
        assert_eq!(log, "block kid kid\nunblock kid\n");
    }

    #[tokio::test]
    async fn failing_script_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let block = write_script(dir.path(), "block.sh", "exit 7");
        let enforcer = ScriptEnforcer::new(&block, &block);

        let err = enforcer.block("kid").await.unwrap_err();
        assert!(err.to_string().contains("exit code 7"));
    }

    #[tokio::test]
    async fn missing_script_is_error() {
        let enforcer = ScriptEnforcer::new("/nonexistent/block", "/nonexistent/unblock");
        assert!(enforcer.unblock("kid").await.is_err());
    }
}
