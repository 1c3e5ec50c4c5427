//! Versioned schema setup for the SQLite backend.
//!
//! Applied versions are recorded in `_schema_versions`, so running the
//! migrations on an existing database only applies what is missing.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// Ordered schema history. Append only.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "config objects keyed by storage identifier",
    sql: r#"
        CREATE TABLE config_objects (
            name       TEXT PRIMARY KEY,
            data       TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );
    "#,
}];

/// Apply every migration newer than the recorded schema version.
pub fn run_all(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _schema_versions (
            version    INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        );",
    )
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: e.to_string(),
    })?;

    let current = current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        info!(
            version = migration.version,
            description = migration.description,
            "applying schema migration"
        );

        let fail = |e: rusqlite::Error| StoreError::Migration {
            version: migration.version,
            message: e.to_string(),
        };

        let tx = conn.unchecked_transaction().map_err(fail)?;
        tx.execute_batch(migration.sql).map_err(fail)?;
        tx.execute(
            "INSERT INTO _schema_versions (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![migration.version, chrono::Utc::now().timestamp()],
        )
        .map_err(fail)?;
        tx.commit().map_err(fail)?;

        applied += 1;
    }

    debug!(applied, current_version = current_version(conn)?, "schema ready");
    Ok(())
}

/// Latest applied schema version, `0` for a fresh database.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _schema_versions",
        [],
        |row| row.get(0),
    )
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: e.to_string(),
    })
}
