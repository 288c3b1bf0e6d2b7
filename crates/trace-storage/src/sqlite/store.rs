//! [`SqliteStore`] -- SQLite-backed entity store.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info};

use trace_config::{IdConfig, TraceConfig};
use trace_core::record::DeletePolicy;

use crate::error::{Result, StorageError};
use crate::sqlite::schema;

/// Behavior knobs of a [`SqliteStore`], usually derived from [`TraceConfig`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// What deleting a record with children does.
    pub parent_on_delete: DeletePolicy,
    /// Generated id lengths.
    pub ids: IdConfig,
    pub busy_timeout_ms: u32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from(&TraceConfig::default())
    }
}

impl From<&TraceConfig> for StoreOptions {
    fn from(config: &TraceConfig) -> Self {
        Self {
            parent_on_delete: config.hierarchy.on_delete,
            ids: config.ids.clone(),
            busy_timeout_ms: config.storage.busy_timeout_ms,
        }
    }
}

/// SQLite-backed implementation of the [`EntityStore`](crate::traits::EntityStore) trait.
///
/// Wraps a [`rusqlite::Connection`] in a `Mutex` for thread safety.  All
/// public methods acquire the lock, execute SQL, and release it.
pub struct SqliteStore {
    /// The mutex-protected SQLite connection.
    pub(crate) conn: Mutex<Connection>,
    pub(crate) options: StoreOptions,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at the given path with default
    /// options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(Some(path.as_ref()), StoreOptions::default())
    }

    /// Opens an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        Self::open_with_options(None, StoreOptions::default())
    }

    /// Opens the store described by the configuration. Without a
    /// `storage.path` the database lives in memory.
    pub fn open_with_config(config: &TraceConfig) -> Result<Self> {
        Self::open_with_options(config.storage.path.as_deref(), StoreOptions::from(config))
    }

    /// Opens a database file, or an in-memory database when `path` is
    /// `None`, then enables foreign keys and initialises the schema.
    pub fn open_with_options(path: Option<&Path>, options: StoreOptions) -> Result<Self> {
        let conn = match path {
            Some(path) => {
                info!(?path, "opening SQLite database");
                Connection::open(path).map_err(|e| {
                    StorageError::Connection(format!("failed to open {}: {e}", path.display()))
                })?
            }
            None => {
                debug!("opening in-memory SQLite database");
                Connection::open_in_memory().map_err(|e| {
                    StorageError::Connection(format!("failed to open in-memory db: {e}"))
                })?
            }
        };

        let store = Self {
            conn: Mutex::new(conn),
            options,
        };
        store.configure_connection()?;
        store.init_schema()?;

        Ok(store)
    }

    /// Returns the options the store was opened with.
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Sets connection pragmas (WAL mode, foreign keys, busy timeout).
    fn configure_connection(&self) -> Result<()> {
        let conn = self.lock_conn()?;

        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = {};",
            self.options.busy_timeout_ms
        ))
        .map_err(|e| StorageError::Connection(format!("failed to set pragmas: {e}")))?;

        Ok(())
    }

    /// Creates all tables and indexes if they do not exist and records the
    /// schema version.
    pub(crate) fn init_schema(&self) -> Result<()> {
        let conn = self.lock_conn()?;

        let version: std::result::Result<i32, _> = conn.query_row(
            "SELECT value FROM metadata WHERE key = 'schema_version'",
            [],
            |row| {
                let v: String = row.get(0)?;
                Ok(v.parse::<i32>().unwrap_or(0))
            },
        );
        if let Ok(v) = version {
            if v >= schema::CURRENT_SCHEMA_VERSION {
                debug!(version = v, "schema already at current version, skipping init");
                return Ok(());
            }
        }

        for stmt in schema::SCHEMA_STATEMENTS {
            conn.execute_batch(stmt).map_err(|e| StorageError::Migration {
                name: "init_schema".into(),
                reason: format!("{e}\nStatement: {}", truncate(stmt, 120)),
            })?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
            rusqlite::params![schema::CURRENT_SCHEMA_VERSION.to_string()],
        )
        .map_err(|e| StorageError::Migration {
            name: "schema_version".into(),
            reason: e.to_string(),
        })?;

        info!("schema initialized (version {})", schema::CURRENT_SCHEMA_VERSION);
        Ok(())
    }

    /// Acquires the connection lock. Helper used by all operation modules.
    pub(crate) fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Connection(format!("mutex poisoned: {e}")))
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Truncates a string for error messages.
fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_creates_tables() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('records', 'statuses', 'metadata')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn schema_version_set() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let version: String = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, schema::CURRENT_SCHEMA_VERSION.to_string());
    }

    #[test]
    fn foreign_keys_enabled() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let on: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(on, 1);
    }

    #[test]
    fn idempotent_init() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
    }

    #[test]
    fn reopen_keeps_only_version_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.db");
        drop(SqliteStore::open(&path).unwrap());

        let store = SqliteStore::open(&path).unwrap();
        let conn = store.lock_conn().unwrap();
        let keys: Vec<String> = conn
            .prepare("SELECT key FROM metadata ORDER BY key")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(keys, vec!["schema_version".to_string()]);
    }

    #[test]
    fn open_with_config_uses_file_and_policy() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TraceConfig::default();
        config.storage.path = Some(dir.path().join("trace.db"));
        config.hierarchy.on_delete = DeletePolicy::Cascade;

        let store = SqliteStore::open_with_config(&config).unwrap();
        assert_eq!(store.options().parent_on_delete, DeletePolicy::Cascade);
        assert!(dir.path().join("trace.db").exists());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("ééé", 2), "éé...");
    }
}
