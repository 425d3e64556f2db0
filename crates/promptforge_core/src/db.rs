//! Embedded local database.
//!
//! [`LocalDatabase`] is a small record store over SQLite: three named
//! collections, each keyed by a primary identifier and holding one JSON
//! record per row. Fields that need non-primary-key lookups are mirrored
//! into indexed columns, which is the SQLite counterpart of a secondary
//! index in the browser-side store this replaces.
//!
//! The connection is shared for the process lifetime (see
//! [`LocalDatabase::shared`]) and is never closed during normal operation.
//! Multi-record writes run inside a SQLite transaction and commit or roll
//! back atomically.

use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use rusqlite::{Connection, params};
use serde_json::Value;

use crate::error::{PromptforgeError, Result};

static SHARED: OnceLock<Arc<LocalDatabase>> = OnceLock::new();

/// Named record collections provisioned by [`LocalDatabase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    /// Per-provider API key configuration, indexed by `provider`.
    ApiConfigs,
    /// Saved prompt versions, indexed by `created_at` and `topic`.
    Versions,
    /// Opaque key/value settings (session snapshot, recovery draft).
    Settings,
}

impl Collection {
    /// All collections, in schema order.
    pub const ALL: [Collection; 3] = [
        Collection::ApiConfigs,
        Collection::Versions,
        Collection::Settings,
    ];

    /// Table name backing this collection.
    pub fn table(self) -> &'static str {
        match self {
            Collection::ApiConfigs => "api_configs",
            Collection::Versions => "versions",
            Collection::Settings => "settings",
        }
    }

    fn key_column(self) -> &'static str {
        match self {
            Collection::Settings => "key",
            _ => "id",
        }
    }

    /// Secondary index columns mirrored out of the JSON record.
    fn index_columns(self) -> &'static [&'static str] {
        match self {
            Collection::ApiConfigs => &["provider"],
            Collection::Versions => &["created_at", "topic"],
            Collection::Settings => &[],
        }
    }
}

/// Extract the mirrored value for an indexed column from a JSON record.
fn index_value(record: &Value, column: &str) -> Option<String> {
    record.get(column).and_then(|v| v.as_str()).map(String::from)
}

/// Embedded record store over a single SQLite connection.
///
/// # Thread Safety
///
/// The connection is wrapped in a `Mutex`; concurrent callers are serialized
/// by the connection, not by the repositories layered on top.
pub struct LocalDatabase {
    conn: Mutex<Connection>,
}

impl LocalDatabase {
    /// Open or create the database at the given path and provision the
    /// collections and their indexes if absent.
    ///
    /// # Errors
    ///
    /// Open or provisioning failure is reported as
    /// [`PromptforgeError::StorageUnavailable`]; every operation depending
    /// on this database is fatal without it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| PromptforgeError::StorageUnavailable(e.to_string()))?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()
            .map_err(|e| PromptforgeError::StorageUnavailable(e.to_string()))?;
        Ok(db)
    }

    /// Create an in-memory database for testing. Data is lost on drop.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| PromptforgeError::StorageUnavailable(e.to_string()))?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()
            .map_err(|e| PromptforgeError::StorageUnavailable(e.to_string()))?;
        Ok(db)
    }

    /// Process-wide shared handle, lazily opened on first use.
    ///
    /// The first caller decides the path; later calls reuse the existing
    /// connection regardless of the path they pass. The handle is never
    /// closed during normal operation.
    pub fn shared<P: AsRef<Path>>(path: P) -> Result<Arc<LocalDatabase>> {
        if let Some(db) = SHARED.get() {
            return Ok(Arc::clone(db));
        }
        let db = Arc::new(Self::open(path)?);
        Ok(Arc::clone(SHARED.get_or_init(|| db)))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            -- Per-provider API key configuration
            CREATE TABLE IF NOT EXISTS api_configs (
                id TEXT PRIMARY KEY,
                provider TEXT,
                record TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_api_configs_provider ON api_configs(provider);

            -- Saved prompt versions
            CREATE TABLE IF NOT EXISTS versions (
                id TEXT PRIMARY KEY,
                created_at TEXT,
                topic TEXT,
                record TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_versions_created_at ON versions(created_at);
            CREATE INDEX IF NOT EXISTS idx_versions_topic ON versions(topic);

            -- Opaque key/value settings
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                record TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Point lookup by primary key. Absence is `None`, not an error.
    pub fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT record FROM {} WHERE {} = ?",
            collection.table(),
            collection.key_column()
        );
        let result = conn.query_row(&sql, params![key], |row| row.get::<_, String>(0));

        match result {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PromptforgeError::Database(e)),
        }
    }

    /// All records in a collection, in unspecified order.
    pub fn get_all(&self, collection: Collection) -> Result<Vec<Value>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT record FROM {}", collection.table());
        let mut stmt = conn.prepare(&sql)?;
        let texts: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;

        texts
            .iter()
            .map(|t| serde_json::from_str(t).map_err(PromptforgeError::from))
            .collect()
    }

    /// Upsert a record under the given key.
    pub fn put(&self, collection: Collection, key: &str, record: &Value) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        Self::put_in(&conn, collection, key, record)
    }

    /// Upsert several records atomically: all commit or none do.
    pub fn put_all(&self, collection: Collection, items: &[(String, Value)]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for (key, record) in items {
            Self::put_in(&tx, collection, key, record)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Atomically replace one record with another: the old key is deleted
    /// and the new record inserted in a single transaction. Used to keep
    /// "at most one record per indexed value" invariants.
    pub fn replace(
        &self,
        collection: Collection,
        old_key: Option<&str>,
        new_key: &str,
        record: &Value,
    ) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        if let Some(old) = old_key {
            let sql = format!(
                "DELETE FROM {} WHERE {} = ?",
                collection.table(),
                collection.key_column()
            );
            tx.execute(&sql, params![old])?;
        }
        Self::put_in(&tx, collection, new_key, record)?;
        tx.commit()?;
        Ok(())
    }

    fn put_in(conn: &Connection, collection: Collection, key: &str, record: &Value) -> Result<()> {
        let text = serde_json::to_string(record)?;
        match collection {
            Collection::Settings => {
                conn.execute(
                    "INSERT OR REPLACE INTO settings (key, record) VALUES (?, ?)",
                    params![key, text],
                )?;
            }
            Collection::ApiConfigs => {
                conn.execute(
                    "INSERT OR REPLACE INTO api_configs (id, provider, record) VALUES (?, ?, ?)",
                    params![key, index_value(record, "provider"), text],
                )?;
            }
            Collection::Versions => {
                conn.execute(
                    "INSERT OR REPLACE INTO versions (id, created_at, topic, record)
                     VALUES (?, ?, ?, ?)",
                    params![
                        key,
                        index_value(record, "created_at"),
                        index_value(record, "topic"),
                        text
                    ],
                )?;
            }
        }
        Ok(())
    }

    /// Delete by primary key. Returns whether a record existed; deleting a
    /// missing key is a successful no-op.
    pub fn delete(&self, collection: Collection, key: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            collection.table(),
            collection.key_column()
        );
        let affected = conn.execute(&sql, params![key])?;
        Ok(affected > 0)
    }

    /// Remove every record in a collection.
    pub fn clear(&self, collection: Collection) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("DELETE FROM {}", collection.table());
        conn.execute(&sql, [])?;
        Ok(())
    }

    /// Remove every record in every collection, atomically.
    pub fn clear_all(&self) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for collection in Collection::ALL {
            let sql = format!("DELETE FROM {}", collection.table());
            tx.execute(&sql, [])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Number of records in a collection.
    pub fn count(&self, collection: Collection) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT COUNT(*) FROM {}", collection.table());
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Secondary-index point lookup: at most one record whose indexed
    /// column equals `value`. Absence is `None`.
    pub fn get_by_index(
        &self,
        collection: Collection,
        index: &str,
        value: &str,
    ) -> Result<Option<Value>> {
        if !collection.index_columns().contains(&index) {
            return Err(PromptforgeError::UnknownIndex {
                collection: collection.table(),
                index: index.to_string(),
            });
        }

        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT record FROM {} WHERE {} = ? LIMIT 1",
            collection.table(),
            index
        );
        let result = conn.query_row(&sql, params![value], |row| row.get::<_, String>(0));

        match result {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PromptforgeError::Database(e)),
        }
    }
}

impl std::fmt::Debug for LocalDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDatabase").finish_non_exhaustive()
    }
}
