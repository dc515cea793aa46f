//! `SQLite`-backed implementation of [`WatermarkStore`].
//!
//! Uses a single `Mutex<Connection>` for thread safety.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use tidemark_types::state::{PipelineId, Watermark};

use crate::backend::WatermarkStore;
use crate::error::{self, StateError};

/// `SQLite` datetime format (UTC, no timezone suffix).
const SQLITE_DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Idempotent DDL for the watermark table.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS sync_watermarks (
    pipeline TEXT PRIMARY KEY NOT NULL,
    watermark TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
";

/// `SQLite`-backed watermark storage, one row per pipeline.
///
/// Create with [`SqliteWatermarkStore::open`] for file-backed persistence
/// or [`SqliteWatermarkStore::in_memory`] for tests.
pub struct SqliteWatermarkStore {
    conn: Mutex<Connection>,
}

impl SqliteWatermarkStore {
    /// Open or create a `SQLite` state database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the directory can't be created,
    /// or [`StateError::Sqlite`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StateError::io(parent, e))?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory `SQLite` store (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Sqlite`] if the in-memory database can't
    /// be initialized.
    pub fn in_memory() -> error::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection lock.
    fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StateError::LockPoisoned)
    }

    /// Format current UTC time for `SQLite` storage.
    fn now_sqlite() -> String {
        Utc::now().format(SQLITE_DATETIME_FMT).to_string()
    }

    #[cfg(test)]
    fn updated_at(&self, pipeline: &PipelineId) -> error::Result<String> {
        let conn = self.lock_conn()?;
        Ok(conn.query_row(
            "SELECT updated_at FROM sync_watermarks WHERE pipeline = ?1",
            [pipeline.as_str()],
            |row| row.get(0),
        )?)
    }
}

impl WatermarkStore for SqliteWatermarkStore {
    fn read(&self, pipeline: &PipelineId) -> error::Result<Option<Watermark>> {
        let conn = self.lock_conn()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT watermark FROM sync_watermarks WHERE pipeline = ?1",
                [pipeline.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(Watermark::new))
    }

    fn write(&self, pipeline: &PipelineId, watermark: &Watermark) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO sync_watermarks (pipeline, watermark, updated_at) \
             VALUES (?1, ?2, ?3) \
             ON CONFLICT(pipeline) \
             DO UPDATE SET watermark = ?2, updated_at = ?3",
            rusqlite::params![pipeline.as_str(), watermark.as_str(), Self::now_sqlite()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(name: &str) -> PipelineId {
        PipelineId::new(name)
    }

    #[test]
    fn watermark_roundtrip() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        let p = pid("fire");
        assert!(store.read(&p).unwrap().is_none());

        store
            .write(&p, &Watermark::new("2024-01-01T00:00:00.000"))
            .unwrap();
        assert_eq!(
            store.read(&p).unwrap(),
            Some(Watermark::new("2024-01-01T00:00:00.000"))
        );
    }

    #[test]
    fn watermark_upsert() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        let p = pid("fire");
        store.write(&p, &Watermark::new("2024-01-01T00:00:00.000")).unwrap();
        store.write(&p, &Watermark::new("2024-03-01T00:00:00.000")).unwrap();
        assert_eq!(
            store.read(&p).unwrap(),
            Some(Watermark::new("2024-03-01T00:00:00.000"))
        );
        assert!(!store.updated_at(&p).unwrap().is_empty());
    }

    #[test]
    fn different_pipelines_independent() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        store.write(&pid("a"), &Watermark::new("2024-01-01T00:00:00.000")).unwrap();
        assert!(store.read(&pid("b")).unwrap().is_none());
    }

    #[test]
    fn blank_stored_value_reads_as_none() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        store.write(&pid("a"), &Watermark::new("   ")).unwrap();
        assert!(store.read(&pid("a")).unwrap().is_none());
    }

    #[test]
    fn open_creates_parent_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("tidemark.db");
        {
            let store = SqliteWatermarkStore::open(&path).unwrap();
            store.write(&pid("a"), &Watermark::new("2024-05-05T00:00:00.000")).unwrap();
        }
        let reopened = SqliteWatermarkStore::open(&path).unwrap();
        assert_eq!(
            reopened.read(&pid("a")).unwrap(),
            Some(Watermark::new("2024-05-05T00:00:00.000"))
        );
    }
}
