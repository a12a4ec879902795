//! SQLite local store with in-memory read cache.

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::PoisonError;

use dashmap::DashMap;
use directories::ProjectDirs;
use rusqlite::Connection;
use rusqlite::OptionalExtension;

use super::LocalStore;
use crate::error::StorageError;

const QUALIFIER: &str = "io";
const ORGANIZATION: &str = "unosquare";
const APPLICATION: &str = "tubular";

/// Default database location.
///
/// - Linux: `$XDG_DATA_HOME/tubular/state.db` or `~/.local/share/tubular/state.db`
/// - macOS: `~/Library/Application Support/io.unosquare.tubular/state.db`
/// - Windows: `C:\Users\<User>\AppData\Roaming\unosquare\tubular\data\state.db`
pub fn default_db_path() -> Option<PathBuf> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
        .map(|dirs| dirs.data_dir().join("state.db"))
}

/// SQLite-backed local store with a DashMap read cache.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    cache: DashMap<String, String>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open the store at [`default_db_path`].
    pub fn open_default() -> Result<Self, StorageError> {
        let path = default_db_path().ok_or(StorageError::NoDataDir)?;
        Self::open(path)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            cache: DashMap::new(),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StorageError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&conn).map_err(StorageError::from)
    }
}

impl LocalStore for SqliteStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        if let Some(value) = self.cache.get(key) {
            return Ok(Some(value.clone()));
        }

        let result = self.with_conn(|conn| {
            conn.query_row("SELECT value FROM state WHERE key = ?", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
        })?;

        if let Some(ref value) = result {
            self.cache.insert(key.to_string(), value.clone());
        }

        Ok(result)
    }

    fn set_raw(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO state (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                rusqlite::params![key, &value],
            )
        })?;

        self.cache.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.with_conn(|conn| conn.execute("DELETE FROM state WHERE key = ?", [key]))?;
        self.cache.remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT key FROM state WHERE key LIKE ? ESCAPE '\\' ORDER BY key")?;
            let rows = stmt.query_map([&pattern], |row| row.get(0))?;
            rows.collect::<Result<Vec<_>, _>>()
        })
    }
}
