//! SQLite-backed config object storage.
//!
//! The [`SqliteBackend`] wraps a `rusqlite::Connection` behind a `Mutex` so
//! it can be shared as an `Arc<dyn ConfigBackend>`. Every write is a single
//! upsert statement and commits on its own.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::backend::{ConfigBackend, ConfigData, check_name};
use crate::error::{StoreError, StoreResult};
use crate::migration;

/// Config backend stored in a SQLite database.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open (or create) a database at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening config database");

        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Create an in-memory database, useful for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory config database");
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        Self::apply_pragmas(&conn)?;
        migration::run_all(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn apply_pragmas(conn: &Connection) -> StoreResult<()> {
        // In-memory databases answer "memory"; either way the call must succeed.
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        debug!(journal_mode = %mode, "config database pragmas applied");
        Ok(())
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Backend(format!("mutex poisoned: {e}")))
    }
}

impl ConfigBackend for SqliteBackend {
    fn read(&self, name: &str) -> StoreResult<Option<ConfigData>> {
        let raw: Option<String> = self
            .conn()?
            .query_row(
                "SELECT data FROM config_objects WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str::<serde_json::Value>(&raw)? {
            serde_json::Value::Object(map) => Ok(Some(map)),
            other => Err(StoreError::Corrupt {
                name: name.to_owned(),
                reason: format!("expected a JSON object, found `{other}`"),
            }),
        }
    }

    fn write(&self, name: &str, data: &ConfigData) -> StoreResult<()> {
        check_name(name)?;
        let json = serde_json::to_string(data)?;

        self.conn()?.execute(
            "INSERT INTO config_objects (name, data, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            params![name, json, Utc::now().timestamp()],
        )?;

        debug!(name, fields = data.len(), "config object written");
        Ok(())
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name FROM config_objects ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(names
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .collect())
    }
}

// ── tests ────────────────────────────────────────────────────────────
