//! JSON file store
//!
//! The budget record lives in `timedata.json`, rewritten atomically
//! (temp file, fsync, rename, directory fsync) on every save. Audit events
//! are appended to `audit.jsonl`, one JSON object per line.

use screentime_api::TimeBudget;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::{AuditEvent, Store, StoreError, StoreResult};

/// Budget state filename
pub const STATE_FILENAME: &str = "timedata.json";

/// Audit log filename
pub const AUDIT_FILENAME: &str = "audit.jsonl";

/// File-backed store
pub struct JsonFileStore {
    state_path: PathBuf,
    audit_path: PathBuf,
    audit_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open a store in `dir`, creating the directory if needed
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        Ok(Self {
            state_path: dir.join(STATE_FILENAME),
            audit_path: dir.join(AUDIT_FILENAME),
            audit_lock: Mutex::new(()),
        })
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let tmp = path.with_extension("tmp");

    let written = write_synced(&tmp, bytes).and_then(|()| fs::rename(&tmp, path));
    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(&tmp)
            && cleanup.kind() != ErrorKind::NotFound
        {
            warn!(path = %tmp.display(), error = %cleanup, "Failed to remove temp file");
        }
        return Err(e.into());
    }

    // The rename is only durable once the directory entry is
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        File::open(dir)?.sync_all()?;
    }
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

impl Store for JsonFileStore {
    fn load_budget(&self) -> StoreResult<Option<TimeBudget>> {
        let data = match fs::read(&self.state_path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let budget = serde_json::from_slice(&data)?;
        Ok(Some(budget))
    }

    fn save_budget(&self, budget: &TimeBudget) -> StoreResult<()> {
        let data = serde_json::to_vec_pretty(budget)?;
        atomic_write(&self.state_path, &data)?;

        debug!(
            path = %self.state_path.display(),
            used = budget.used_minutes,
            limit = budget.daily_limit_minutes,
            blocked = budget.blocked,
            "Budget saved"
        );
        Ok(())
    }

    fn append_audit(&self, event: AuditEvent) -> StoreResult<()> {
        let _guard = self
            .audit_lock
            .lock()
            .map_err(|_| StoreError::Io(std::io::Error::other("audit lock poisoned")))?;

        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let file = match File::open(&self.audit_path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEvent>(&line) {
                Ok(mut event) => {
                    event.id = index as i64 + 1;
                    events.push(event);
                }
                Err(e) => warn!(line = index + 1, error = %e, "Skipping unreadable audit line"),
            }
        }

        events.reverse();
        events.truncate(limit);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuditEventType;
    use chrono::NaiveDate;

    fn sample_budget() -> TimeBudget {
        TimeBudget::fresh(
            NaiveDate::from_ymd_opt(2025, 4, 9).unwrap(),
            120,
            screentime_util::now(),
        )
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(store.load_budget().unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        let mut budget = sample_budget();
        budget.used_minutes = 33;
        budget.blocked = true;
        store.save_budget(&budget).unwrap();

        let loaded = store.load_budget().unwrap().unwrap();
        assert_eq!(loaded, budget);
        assert!(!dir.path().join("timedata.tmp").exists());
    }

    #[test]
    fn failed_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        // A directory in the way makes the rename fail
        fs::create_dir(store.state_path()).unwrap();

        assert!(matches!(store.save_budget(&sample_budget()), Err(StoreError::Io(_))));
        assert!(!dir.path().join("timedata.tmp").exists());
        assert!(store.state_path().is_dir());
    }

    #[test]
    fn corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        fs::write(store.state_path(), b"{ not json").unwrap();

        assert!(matches!(store.load_budget(), Err(StoreError::Serialization(_))));
    }

    #[test]
    fn creates_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = JsonFileStore::open(&nested).unwrap();
        store.save_budget(&sample_budget()).unwrap();
        assert!(nested.join(STATE_FILENAME).exists());
    }

    #[test]
    fn audit_log_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStarted))
            .unwrap();
        store
            .append_audit(AuditEvent::new(AuditEventType::LimitAdjusted {
                delta_minutes: 15,
                new_limit: 135,
            }))
            .unwrap();
        store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStopped))
            .unwrap();

        let events = store.get_recent_audits(2).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].event, AuditEventType::ServiceStopped));
        assert_eq!(events[0].id, 3);
        assert!(matches!(
            events[1].event,
            AuditEventType::LimitAdjusted { delta_minutes: 15, .. }
        ));
    }
}
