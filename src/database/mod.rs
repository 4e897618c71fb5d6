pub mod schema;

use crate::error::{SyncError, SyncResult};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// Key of the persisted operation log
pub const KEY_OP_QUEUE: &str = "@sync__op_queue_v2";
/// Key of the list watermark (last reconciled remote `lastModified`)
pub const KEY_LAST_SYNC_TIME_LISTS: &str = "@sync__last_sync_time_lists";

/// Generic durable key-value persistence
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> SyncResult<Option<String>>;
    fn save(&self, key: &str, value: &str) -> SyncResult<()>;
    fn remove(&self, key: &str) -> SyncResult<()>;
}

/// SQLite backed key-value store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database file and initialises the schema
    pub fn open(path: &Path) -> SyncResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> SyncResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> SyncResult<Self> {
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> SyncResult<T>) -> SyncResult<T> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| SyncError::Other("Key-value store lock poisoned".to_string()))?;
        f(&guard)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> SyncResult<Option<String>> {
        self.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM kv_store WHERE key = ?1",
                    rusqlite::params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    fn save(&self, key: &str, value: &str) -> SyncResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
                rusqlite::params![key, value],
            )?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> SyncResult<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM kv_store WHERE key = ?1", rusqlite::params![key])?;
            Ok(())
        })
    }
}

/// Reads the list watermark; 0 when nothing has been synced yet
pub fn load_last_sync_time_lists(store: &dyn KeyValueStore) -> SyncResult<i64> {
    match store.get(KEY_LAST_SYNC_TIME_LISTS)? {
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|e| SyncError::Other(format!("Invalid watermark {:?}: {}", raw, e))),
        None => Ok(0),
    }
}

/// Persists the list watermark
pub fn save_last_sync_time_lists(store: &dyn KeyValueStore, timestamp: i64) -> SyncResult<()> {
    store.save(KEY_LAST_SYNC_TIME_LISTS, &timestamp.to_string())
}
