//! `SQLite` workspace handle.
//!
//! One handle wraps one connection. Handles are never shared between
//! factory calls; every `create` opens a fresh connection.

use crate::connection::BackendKind;
use crate::error::{BackendError, Result};
use crate::workspace::memory::poisoned;
use crate::workspace::traits::{Access, ReadOnlyWorkspace, Workspace};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Name of the table holding workspace records.
pub const RECORDS_TABLE: &str = "records";

/// DDL for the records table.
pub const RECORDS_TABLE_SQL: &str = r"
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL,  -- JSON serialized record
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (collection, id)
);
";

/// Busy timeout applied to every connection.
const BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Workspace handle over a single `SQLite` connection.
pub struct SqliteWorkspace {
    conn: Mutex<Connection>,
    path: PathBuf,
    access: Access,
    kind: BackendKind,
}

impl SqliteWorkspace {
    /// Opens a handle on an existing database.
    ///
    /// The database is never created here; schema readiness is established
    /// before any handle is handed out. [`Access::ReadOnly`] opens the
    /// connection without write intent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, access: Access, kind: BackendKind) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mode = match access {
            Access::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
            Access::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
        };
        let flags = mode | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&path, flags).map_err(BackendError::from)?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(BackendError::from)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(BackendError::from)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
            access,
            kind,
        })
    }

    /// Returns the database path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the access mode the handle was opened with.
    #[must_use]
    pub const fn access(&self) -> Access {
        self.access
    }

    fn ensure_writable(&self) -> Result<()> {
        match self.access {
            Access::ReadWrite => Ok(()),
            Access::ReadOnly => Err(BackendError::ReadOnly.into()),
        }
    }

    /// Returns current Unix timestamp.
    #[allow(clippy::cast_possible_wrap)]
    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

impl ReadOnlyWorkspace for SqliteWorkspace {
    fn backend(&self) -> BackendKind {
        self.kind
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let conn = self.conn.lock().map_err(poisoned)?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM records WHERE collection = ? AND id = ?",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()
            .map_err(BackendError::from)?;

        match data {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn list(&self, collection: &str) -> Result<Vec<Value>> {
        let conn = self.conn.lock().map_err(poisoned)?;
        let mut stmt = conn
            .prepare("SELECT data FROM records WHERE collection = ? ORDER BY id")
            .map_err(BackendError::from)?;
        let rows = stmt
            .query_map(params![collection], |row| row.get::<_, String>(0))
            .map_err(BackendError::from)?;

        let mut values = Vec::new();
        for text in rows {
            let text = text.map_err(BackendError::from)?;
            values.push(serde_json::from_str(&text)?);
        }
        Ok(values)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn count(&self, collection: &str) -> Result<usize> {
        let conn = self.conn.lock().map_err(poisoned)?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM records WHERE collection = ?",
                params![collection],
                |row| row.get(0),
            )
            .map_err(BackendError::from)?;
        Ok(count as usize)
    }
}

impl Workspace for SqliteWorkspace {
    fn put(&self, collection: &str, id: &str, value: Value) -> Result<()> {
        self.ensure_writable()?;
        let data = serde_json::to_string(&value)?;
        let conn = self.conn.lock().map_err(poisoned)?;
        conn.execute(
            "INSERT OR REPLACE INTO records (collection, id, data, updated_at) VALUES (?, ?, ?, ?)",
            params![collection, id, data, Self::now()],
        )
        .map_err(BackendError::from)?;
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        self.ensure_writable()?;
        let conn = self.conn.lock().map_err(poisoned)?;
        let deleted = conn
            .execute(
                "DELETE FROM records WHERE collection = ? AND id = ?",
                params![collection, id],
            )
            .map_err(BackendError::from)?;
        Ok(deleted > 0)
    }

    fn commit(&self) -> Result<()> {
        // Statements run in autocommit mode.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.sdf");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(RECORDS_TABLE_SQL).unwrap();
        (dir, path)
    }

    #[test]
    fn test_crud() {
        let (_dir, path) = setup();
        let ws = SqliteWorkspace::open(&path, Access::ReadWrite, BackendKind::RelationalFile)
            .unwrap();

        ws.put("tables", "t1", json!({"seats": 4})).unwrap();
        ws.put("tables", "t0", json!({"seats": 2})).unwrap();
        assert_eq!(ws.get("tables", "t1").unwrap(), Some(json!({"seats": 4})));
        assert_eq!(ws.count("tables").unwrap(), 2);
        assert_eq!(
            ws.list("tables").unwrap(),
            vec![json!({"seats": 2}), json!({"seats": 4})]
        );

        assert!(ws.delete("tables", "t1").unwrap());
        assert!(!ws.delete("tables", "t1").unwrap());
        assert_eq!(ws.get("tables", "t1").unwrap(), None);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let (_dir, path) = setup();
        let ws =
            SqliteWorkspace::open(&path, Access::ReadOnly, BackendKind::RelationalFile).unwrap();
        assert_eq!(ws.access(), Access::ReadOnly);
        assert!(ws.put("tables", "t1", json!(1)).is_err());
        assert_eq!(ws.count("tables").unwrap(), 0);
    }

    #[test]
    fn test_open_never_creates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.sdf");
        assert!(
            SqliteWorkspace::open(&path, Access::ReadWrite, BackendKind::RelationalFile).is_err()
        );
        assert!(!path.exists());
    }
}
