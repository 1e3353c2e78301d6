//! Record store connection handling and schema creation.
//!
//! The store is a single `SQLite` file shared by every component. A
//! [`DataHubDb`] handle wraps the connection in an `Arc<Mutex<_>>` so it can
//! be cloned into request handlers and worker tasks; `SQLite` serializes
//! writers anyway, so one guarded connection is sufficient for the
//! one-writer-per-request model this system assumes.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::Connection;

use crate::StoreError;

/// Default path for the record store database.
pub const DEFAULT_DB_PATH: &str = "data/data_hub.db";

/// Environment variable overriding [`DEFAULT_DB_PATH`].
pub const DB_PATH_ENV: &str = "DATA_HUB_DB_PATH";

/// Cloneable handle to the record store.
#[derive(Clone)]
pub struct DataHubDb {
    conn: Arc<Mutex<Connection>>,
}

impl DataHubDb {
    /// Opens (or creates) the record store at `path` and ensures the schema
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the parent directory cannot be created or
    /// the connection or schema creation fails.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Opens an in-memory store. Used by tests and the demo workflow.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if schema creation fails.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        create_schema(&conn)?;
        ensure_default_user(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Acquires the underlying connection.
    ///
    /// # Panics
    ///
    /// Panics if the `Mutex` is poisoned.
    pub fn acquire(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("record store mutex poisoned")
    }
}

/// Opens the record store at the path named by `DATA_HUB_DB_PATH`, falling
/// back to [`DEFAULT_DB_PATH`].
///
/// # Errors
///
/// Returns [`StoreError`] if the store cannot be opened.
pub fn connect_from_env() -> Result<DataHubDb, StoreError> {
    let path = std::env::var(DB_PATH_ENV).unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
    log::info!("Opening record store at {path}");
    DataHubDb::open(Path::new(&path))
}

fn create_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS data_sources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            description TEXT,
            connection_info TEXT NOT NULL DEFAULT '{}',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS datasets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            source_id INTEGER NOT NULL REFERENCES data_sources(id),
            schema_info TEXT,
            record_count INTEGER NOT NULL DEFAULT 0,
            size_bytes INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS data_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            dataset_id INTEGER NOT NULL REFERENCES datasets(id),
            payload TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS data_ingestion_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            dataset_id INTEGER NOT NULL REFERENCES datasets(id),
            source_id INTEGER NOT NULL REFERENCES data_sources(id),
            records_processed INTEGER NOT NULL DEFAULT 0,
            records_failed INTEGER NOT NULL DEFAULT 0,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            status TEXT NOT NULL DEFAULT 'RUNNING',
            error_message TEXT
        );

        CREATE TABLE IF NOT EXISTS data_analyses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            dataset_id INTEGER NOT NULL REFERENCES datasets(id),
            kind TEXT NOT NULL,
            parameters TEXT NOT NULL DEFAULT '{}',
            result TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS data_queries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id),
            query_text TEXT NOT NULL,
            dataset_id INTEGER REFERENCES datasets(id),
            result TEXT NOT NULL DEFAULT '{}',
            execution_time_ms INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_data_records_dataset
            ON data_records(dataset_id);
        CREATE INDEX IF NOT EXISTS idx_ingestion_logs_dataset
            ON data_ingestion_logs(dataset_id);
        CREATE INDEX IF NOT EXISTS idx_data_analyses_dataset
            ON data_analyses(dataset_id);
        CREATE INDEX IF NOT EXISTS idx_data_queries_dataset
            ON data_queries(dataset_id);",
    )?;

    Ok(())
}

/// Seeds the default user row (id 1) that query audit rows reference.
fn ensure_default_user(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, is_active, created_at)
         SELECT 1, 'admin', 'admin@localhost', '', 1, ?1
         WHERE NOT EXISTS (SELECT 1 FROM users WHERE id = 1)",
        rusqlite::params![Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creation_is_idempotent() {
        let db = DataHubDb::open_in_memory().unwrap();
        {
            let conn = db.acquire();
            create_schema(&conn).unwrap();
            create_schema(&conn).unwrap();
        }
    }

    #[test]
    fn default_user_is_seeded_once() {
        let db = DataHubDb::open_in_memory().unwrap();
        let conn = db.acquire();
        ensure_default_user(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users WHERE id = 1", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn open_creates_parent_directory() {
        let tmp = std::env::temp_dir().join("data_hub_store_test_open");
        let _ = std::fs::remove_dir_all(&tmp);

        let path = tmp.join("nested").join("hub.db");
        let _db = DataHubDb::open(&path).unwrap();
        assert!(path.exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
