//! `SQLite`-backed implementation of [`WatermarkStore`].
//!
//! Uses a single `Mutex<Connection>` for thread safety.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use tidemark_types::stream::StreamKey;
use tidemark_types::watermark::Watermark;

use crate::backend::WatermarkStore;
use crate::error::{self, StateError};

/// `SQLite` datetime format (UTC, no timezone suffix).
const SQLITE_DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Idempotent DDL for the watermark table.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS watermarks (
    protocol TEXT NOT NULL,
    stream TEXT NOT NULL,
    last_timestamp TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (protocol, stream)
);
";

/// `SQLite`-backed watermark storage.
///
/// Create with [`SqliteWatermarkStore::open`] for file-backed persistence
/// or [`SqliteWatermarkStore::in_memory`] for tests.
pub struct SqliteWatermarkStore {
    conn: Mutex<Connection>,
}

impl SqliteWatermarkStore {
    /// Open or create a `SQLite` watermark database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the directory can't be created,
    /// or [`StateError::Sqlite`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
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
}

impl WatermarkStore for SqliteWatermarkStore {
    fn get(&self, stream: &StreamKey) -> error::Result<Option<Watermark>> {
        let conn = self.lock_conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT last_timestamp FROM watermarks WHERE protocol = ?1 AND stream = ?2",
                rusqlite::params![stream.protocol(), stream.name()],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|raw| Watermark::parse_iso(&raw))
            .transpose()
            .map_err(StateError::from)
    }

    fn set(&self, stream: &StreamKey, watermark: Watermark) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO watermarks (protocol, stream, last_timestamp, updated_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(protocol, stream) \
             DO UPDATE SET last_timestamp = ?3, updated_at = ?4",
            rusqlite::params![
                stream.protocol(),
                stream.name(),
                watermark.to_iso(),
                Self::now_sqlite(),
            ],
        )?;
        Ok(())
    }

    fn list(&self) -> error::Result<Vec<(StreamKey, Watermark)>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT protocol, stream, last_timestamp FROM watermarks ORDER BY protocol, stream",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (protocol, name, raw) = row?;
            out.push((StreamKey::new(protocol, name), Watermark::parse_iso(&raw)?));
        }
        Ok(out)
    }

    fn clear(&self, stream: &StreamKey) -> error::Result<bool> {
        let conn = self.lock_conn()?;
        let removed = conn.execute(
            "DELETE FROM watermarks WHERE protocol = ?1 AND stream = ?2",
            rusqlite::params![stream.protocol(), stream.name()],
        )?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(protocol: &str, name: &str) -> StreamKey {
        StreamKey::new(protocol, name)
    }

    #[test]
    fn watermark_roundtrip() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        let k = key("Bucket", "SUI_Bottle_Created");
        assert!(store.get(&k).unwrap().is_none());

        store.set(&k, Watermark::from_millis(1_717_171_717_123)).unwrap();
        assert_eq!(
            store.get(&k).unwrap(),
            Some(Watermark::from_millis(1_717_171_717_123))
        );
    }

    #[test]
    fn watermark_upsert() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        let k = key("Bucket", "SUI_Bottle_Created");
        store.set(&k, Watermark::from_millis(100)).unwrap();
        store.set(&k, Watermark::from_millis(200)).unwrap();
        assert_eq!(store.get(&k).unwrap(), Some(Watermark::from_millis(200)));
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn different_protocols_independent() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        store
            .set(&key("Navi", "Deposit"), Watermark::from_millis(1))
            .unwrap();
        store
            .set(&key("Mole", "Deposit"), Watermark::from_millis(2))
            .unwrap();

        let listed = store.list().unwrap();
        assert_eq!(
            listed,
            vec![
                (key("Mole", "Deposit"), Watermark::from_millis(2)),
                (key("Navi", "Deposit"), Watermark::from_millis(1)),
            ]
        );
    }

    #[test]
    fn clear_reports_removal() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        let k = key("Bucket", "Total_Fee_Value_From");
        assert!(!store.clear(&k).unwrap());
        store.set(&k, Watermark::from_millis(7)).unwrap();
        assert!(store.clear(&k).unwrap());
        assert!(store.get(&k).unwrap().is_none());
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.db");
        let store = SqliteWatermarkStore::open(&path).unwrap();
        store
            .set(&key("Bucket", "x"), Watermark::from_millis(1))
            .unwrap();
        drop(store);

        let reopened = SqliteWatermarkStore::open(&path).unwrap();
        assert_eq!(
            reopened.get(&key("Bucket", "x")).unwrap(),
            Some(Watermark::from_millis(1))
        );
    }
}
