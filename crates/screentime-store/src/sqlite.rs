//! SQLite-based store implementation

use chrono::{DateTime, Local, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension};
use screentime_api::TimeBudget;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::{AuditEvent, Store, StoreError, StoreResult};

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Budget record (single row)
            CREATE TABLE IF NOT EXISTS budget (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                day TEXT NOT NULL,
                used_minutes INTEGER NOT NULL,
                daily_limit_minutes INTEGER NOT NULL,
                blocked INTEGER NOT NULL,
                last_checked_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

fn parse_day(value: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| StoreError::Serialization(format!("bad day '{}': {}", value, e)))
}

fn parse_timestamp(value: &str) -> StoreResult<DateTime<Local>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|e| StoreError::Serialization(format!("bad timestamp '{}': {}", value, e)))
}

impl Store for SqliteStore {
    fn load_budget(&self) -> StoreResult<Option<TimeBudget>> {
        let conn = self.conn()?;

        let row: Option<(String, u32, u32, bool, String)> = conn
            .query_row(
                "SELECT day, used_minutes, daily_limit_minutes, blocked, last_checked_at
                 FROM budget WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?;

        let Some((day, used_minutes, daily_limit_minutes, blocked, last_checked_at)) = row else {
            return Ok(None);
        };

        Ok(Some(TimeBudget {
            day: parse_day(&day)?,
            used_minutes,
            daily_limit_minutes,
            blocked,
            last_checked_at: parse_timestamp(&last_checked_at)?,
        }))
    }

    fn save_budget(&self, budget: &TimeBudget) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO budget (id, day, used_minutes, daily_limit_minutes, blocked, last_checked_at)
            VALUES (1, ?, ?, ?, ?, ?)
            ON CONFLICT(id)
            DO UPDATE SET
                day = excluded.day,
                used_minutes = excluded.used_minutes,
                daily_limit_minutes = excluded.daily_limit_minutes,
                blocked = excluded.blocked,
                last_checked_at = excluded.last_checked_at
            "#,
            params![
                screentime_util::format_day(budget.day),
                budget.used_minutes,
                budget.daily_limit_minutes,
                budget.blocked,
                budget.last_checked_at.to_rfc3339(),
            ],
        )?;

        debug!(
            day = %budget.day,
            used = budget.used_minutes,
            limit = budget.daily_limit_minutes,
            blocked = budget.blocked,
            "Budget saved"
        );
        Ok(())
    }

    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp = parse_timestamp(&timestamp_str).unwrap_or_else(|_| screentime_util::now());
            let event: crate::AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }
}
