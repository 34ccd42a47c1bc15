//! Client-local durable key-value backends.
//!
//! The store writes its entire registry under one fixed key, so a backend only
//! needs `get` and `put`. Two backends ship with the crate:
//!
//! - [`MemoryKv`]: an in-process map whose clones share contents; used by
//!   tests and by sessions that do not need durability.
//! - [`SqliteKv`]: a single SQLite table:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS kv (
//!     key        TEXT PRIMARY KEY,
//!     value      BLOB NOT NULL,
//!     updated_at TEXT NOT NULL,
//!     checksum   TEXT
//! );
//! ```
//!
//! With checksums enabled a CRC-32 of each value is stored alongside it. A
//! mismatch on read is logged, and the value is still returned; the decoder
//! decides whether it is usable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::error::Result;

/// A minimal durable key-value store.
pub trait KeyValueStore: Send {
    /// Read the value under `key`, or `None` if it was never written.
    ///
    /// # Errors
    /// Backend-specific read failures.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write (upsert) `value` under `key`.
    ///
    /// # Errors
    /// Backend-specific write failures (quota, I/O, locked database).
    fn put(&mut self, key: &str, value: &[u8]) -> Result<()>;
}

// ---------------------------------------------------------------------------
// MemoryKv
// ---------------------------------------------------------------------------

/// In-process key-value store. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryKv {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with `value` under `key`.
    #[must_use]
    pub fn with_entry(key: &str, value: impl Into<Vec<u8>>) -> Self {
        let kv = Self::new();
        kv.entries.lock().insert(key.to_string(), value.into());
        kv
    }

    /// Number of keys held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no key has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SqliteKv
// ---------------------------------------------------------------------------

const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS kv (
    key        TEXT PRIMARY KEY,
    value      BLOB NOT NULL,
    updated_at TEXT NOT NULL,
    checksum   TEXT
);";

/// SQLite-backed key-value store.
pub struct SqliteKv {
    conn: Connection,
    config: PersistenceConfig,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteKv")
            .field("db_path", &self.db_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SqliteKv {
    /// Open (or create) a database at `path`.
    ///
    /// # Errors
    /// Returns [`crate::ErodeError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;
        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA_SQL)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "erode durable store opened"
        );

        Ok(Self {
            conn,
            config: config.clone(),
            db_path,
        })
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns [`crate::ErodeError::Database`] on SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn,
            config: config.clone(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Path to the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run SQLite's integrity check.
    ///
    /// # Errors
    /// Returns [`crate::ErodeError::Database`] if the check itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }
}

impl KeyValueStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let start = Instant::now();
        let mut stmt = self
            .conn
            .prepare_cached("SELECT value, checksum FROM kv WHERE key = ?1")?;
        let row: Option<(Vec<u8>, Option<String>)> = stmt
            .query_row(params![key], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        let Some((value, stored_checksum)) = row else {
            return Ok(None);
        };

        if self.config.checksum_enabled {
            if let Some(expected) = stored_checksum {
                let actual = crc32_hex(&value);
                if expected != actual {
                    warn!(
                        key,
                        expected = %expected,
                        actual = %actual,
                        "Checksum mismatch, possible storage corruption"
                    );
                }
            }
        }

        debug!(
            key,
            bytes = value.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Loaded durable value"
        );
        Ok(Some(value))
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        let start = Instant::now();
        let checksum = self.config.checksum_enabled.then(|| crc32_hex(value));
        let now = Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at, checksum)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at,
                checksum = excluded.checksum",
            params![key, value, now, checksum],
        )?;

        debug!(
            key,
            bytes = value.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Saved durable value"
        );
        Ok(())
    }
}

fn crc32_hex(data: &[u8]) -> String {
    format!("{:08x}", crc32fast::hash(data))
}
