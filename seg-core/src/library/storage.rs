//! Key/value backends for the persona library.
//!
//! The library stores one JSON document under a single key. Two backends:
//! [`MemoryKv`] for tests and throwaway sessions, and [`SqliteKv`], which
//! persists to an SQLite database:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS kv_store (
//!     key        TEXT PRIMARY KEY,
//!     value      BLOB NOT NULL,
//!     updated_at TEXT NOT NULL,
//!     checksum   TEXT
//! );
//! ```
//!
//! WAL mode is on for file databases. A CRC-32 of each value is stored and
//! checked on read; a mismatch is logged and the value is still returned.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use rusqlite::{Connection, OpenFlags, params};
use tracing::{debug, info, warn};

use crate::error::Result;

/// A string key/value store.
pub trait KeyValueStore: Send {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// In-process store.
#[derive(Debug, Default, Clone)]
pub struct MemoryKv {
    values: HashMap<String, String>,
}

impl MemoryKv {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

/// CRC-32 (ISO 3309) of `data` as lowercase hex.
fn crc32_hex(data: &[u8]) -> String {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 == 1 { (crc >> 1) ^ POLY } else { crc >> 1 };
        }
    }
    format!("{:08x}", !crc)
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv_store (
    key        TEXT PRIMARY KEY,
    value      BLOB NOT NULL,
    updated_at TEXT NOT NULL,
    checksum   TEXT
);";

/// SQLite-backed store.
pub struct SqliteKv {
    conn: Connection,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteKv")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl SqliteKv {
    /// Open (or create) a database at `path`.
    ///
    /// # Errors
    ///
    /// [`crate::SegError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)?;

        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %db_path.display(), "Key/value store opened");
        Ok(Self { conn, db_path })
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    ///
    /// [`crate::SegError::Database`] on SQLite failures.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Path to the database file, or `:memory:`.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Copy the database to `dest` with SQLite's online-backup API.
    ///
    /// # Errors
    ///
    /// [`crate::SegError::Database`] on SQLite failures.
    pub fn backup<P: AsRef<Path>>(&self, dest: P) -> Result<()> {
        let start = Instant::now();
        let mut target = Connection::open(dest.as_ref())?;
        let backup = rusqlite::backup::Backup::new(&self.conn, &mut target)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;
        info!(
            dest = %dest.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "Key/value backup completed"
        );
        Ok(())
    }

    /// Run `PRAGMA integrity_check`.
    ///
    /// # Errors
    ///
    /// [`crate::SegError::Database`] if the check itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }
}

impl KeyValueStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT value, checksum FROM kv_store WHERE key = ?1")?;
        let row: Option<(Vec<u8>, Option<String>)> = stmt
            .query_row(params![key], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        let Some((data, stored_checksum)) = row else {
            return Ok(None);
        };

        if let Some(expected) = stored_checksum {
            let actual = crc32_hex(&data);
            if expected != actual {
                warn!(
                    key,
                    expected = %expected,
                    actual = %actual,
                    "Checksum mismatch, stored value may be corrupt"
                );
            }
        }

        debug!(key, bytes = data.len(), "Read value");
        Ok(Some(String::from_utf8_lossy(&data).into_owned()))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        let checksum = crc32_hex(bytes);
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at, checksum)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at,
                checksum = excluded.checksum",
            params![key, bytes, now, checksum],
        )?;
        debug!(key, bytes = bytes.len(), "Wrote value");
        Ok(())
    }
}

/// Adds `.optional()` to `rusqlite::Result`, mapping
/// `QueryReturnedNoRows` to `Ok(None)`.
trait OptionalExt<T> {
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
