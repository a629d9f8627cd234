//! Session detection

use async_trait::async_trait;
use nix::unistd::User;
use screentime_host_api::{HostError, HostResult, SessionMonitor};
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;
use tracing::debug;

use crate::command::run_checked;

/// Detects sessions by running a session listing command (`who` by default)
/// and looking for the user's name in its output.
pub struct WhoMonitor {
    argv: Vec<String>,
}

impl WhoMonitor {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl Default for WhoMonitor {
    fn default() -> Self {
        Self::new(vec!["who".into()])
    }
}

/// Whether a session listing mentions `user` as a whole word.
///
/// Matching is case-insensitive. A leading `>` (current-session marker in
/// some listings) is ignored.
pub fn listing_mentions_user(listing: &str, user: &str) -> bool {
    listing.lines().any(|line| {
        line.split_whitespace()
            .map(|word| word.trim_start_matches('>'))
            .any(|word| word.eq_ignore_ascii_case(user))
    })
}

#[async_trait]
impl SessionMonitor for WhoMonitor {
    fn name(&self) -> &str {
        "who"
    }

    async fn is_logged_in(&self, user: &str) -> HostResult<bool> {
        let output = run_checked(&self.argv, &[]).await?;
        let found = listing_mentions_user(&output.stdout, user);
        debug!(user = %user, found, "Session listing checked");
        Ok(found)
    }
}

/// Detects sessions by looking for any process owned by the user.
pub struct ProcessOwnerMonitor {
    proc_root: PathBuf,
}

impl ProcessOwnerMonitor {
    pub fn new() -> Self {
        Self::with_proc_root("/proc")
    }

    pub fn with_proc_root(root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: root.into(),
        }
    }
}

impl Default for ProcessOwnerMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_uid(user: &str) -> HostResult<u32> {
    match User::from_name(user) {
        Ok(Some(entry)) => Ok(entry.uid.as_raw()),
        Ok(None) => Err(HostError::UnknownUser(user.to_string())),
        Err(e) => Err(HostError::Internal(format!("user lookup failed: {}", e))),
    }
}

/// Count process directories under `proc_root` owned by `uid`.
fn count_owned_processes(proc_root: &std::path::Path, uid: u32) -> HostResult<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(proc_root)? {
        let Ok(entry) = entry else { continue };
        let is_pid = entry
            .file_name()
            .to_str()
            .is_some_and(|name| !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()));
        if !is_pid {
            continue;
        }
        // Processes may exit between listing and stat.
        if let Ok(meta) = entry.metadata()
            && meta.uid() == uid
        {
            count += 1;
        }
    }
    Ok(count)
}

#[async_trait]
impl SessionMonitor for ProcessOwnerMonitor {
    fn name(&self) -> &str {
        "process_owner"
    }

    async fn is_logged_in(&self, user: &str) -> HostResult<bool> {
        let uid = resolve_uid(user)?;
        let root = self.proc_root.clone();

        let count = tokio::task::spawn_blocking(move || count_owned_processes(&root, uid))
            .await
            .map_err(|e| HostError::Internal(format!("process scan panicked: {}", e)))??;

        debug!(user = %user, uid, processes = count, "Process ownership checked");
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::getuid;

    #[test]
    fn listing_matching() {
        let who = "kid      tty7         2025-01-15 08:02 (:0)\n\
                   parent   pts/0        2025-01-15 09:10 (10.0.0.2)\n";
        assert!(listing_mentions_user(who, "kid"));
        assert!(listing_mentions_user(who, "KID"));
        assert!(!listing_mentions_user(who, "ki"));
        assert!(!listing_mentions_user(who, "guest"));
    }

    #[test]
    fn listing_ignores_current_session_marker() {
        let query_user = " USERNAME   SESSIONNAME   ID  STATE\n>kid        console        1  Active\n";
        assert!(listing_mentions_user(query_user, "kid"));
    }

    #[test]
    fn empty_listing() {
        assert!(!listing_mentions_user("", "kid"));
    }

    #[tokio::test]
    async fn who_monitor_uses_configured_command() {
        let monitor = WhoMonitor::new(vec![
            "sh".into(),
            "-c".into(),
            "echo 'kid tty1 2025-01-15 08:00'".into(),
        ]);
        assert!(monitor.is_logged_in("kid").await.unwrap());
        assert!(!monitor.is_logged_in("other").await.unwrap());
    }

    #[tokio::test]
    async fn who_monitor_failure_is_error() {
        let monitor = WhoMonitor::new(vec!["sh".into(), "-c".into(), "exit 1".into()]);
        assert!(monitor.is_logged_in("kid").await.is_err());
    }

    #[test]
    fn current_process_is_counted() {
        let uid = getuid().as_raw();
        let count = count_owned_processes(std::path::Path::new("/proc"), uid).unwrap();
        assert!(count >= 1);
    }

    #[test]
    fn non_pid_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("self")).unwrap();
        std::fs::create_dir(dir.path().join("sys")).unwrap();
        std::fs::create_dir(dir.path().join("123")).unwrap();

        let uid = getuid().as_raw();
        assert_eq!(count_owned_processes(dir.path(), uid).unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_user_is_error() {
        let monitor = ProcessOwnerMonitor::new();
        let result = monitor.is_logged_in("no-such-user-screentime-test").await;
        assert!(matches!(result, Err(HostError::UnknownUser(_))));
    }
}
