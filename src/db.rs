use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::{CovtreeError, Result};
use crate::store::KeyValueStore;

pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA: &str = include_str!("../schema.sql");

/// Key-value store backed by a SQLite database.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and initialize its schema.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open(path)?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Keys starting with `prefix`, sorted.
    pub fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key")?;
        let keys = stmt
            .query_map(params![prefix], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Open (or create) the covtree database at the given path.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
    Ok(conn)
}

/// Ensure the schema is initialized. Safe to call on an already-initialized DB.
/// Performs forward migrations when the on-disk schema version is older than
/// `SCHEMA_VERSION`.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: u32 = conn.query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))?;
    if count == 0 {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;
        return Ok(());
    }

    let version = schema_version(conn)?;
    if version == SCHEMA_VERSION {
        return Ok(());
    }
    if version > SCHEMA_VERSION {
        return Err(CovtreeError::Other(format!(
            "Database schema version {} is newer than this binary supports ({}). \
             Please upgrade covtree.",
            version, SCHEMA_VERSION
        )));
    }
    migrate(conn, version)
}

pub fn schema_version(conn: &Connection) -> Result<u32> {
    let version = conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
        row.get(0)
    })?;
    Ok(version)
}

/// SQL moving the schema from version `N` to `N + 1`, at index `N - 1`.
///
/// To add a migration, bump `SCHEMA_VERSION`, append its SQL here, and
/// update schema.sql to the final state (new databases skip migrations).
const MIGRATIONS: &[&str] = &[];

/// Apply migrations from `from_version` up to `SCHEMA_VERSION`.
fn migrate(conn: &Connection, from_version: u32) -> Result<()> {
    for version in from_version..SCHEMA_VERSION {
        let sql = version
            .checked_sub(1)
            .and_then(|i| MIGRATIONS.get(i as usize))
            .ok_or_else(|| {
                CovtreeError::Other(format!(
                    "No migration path from schema version {} to {}. \
                     Delete the database to start a fresh history.",
                    version,
                    version + 1
                ))
            })?;
        log::info!(
            "migrating database schema from version {} to {}",
            version,
            version + 1
        );
        conn.execute_batch(sql)?;
        conn.execute("UPDATE schema_version SET version = ?1", params![version + 1])?;
    }
    Ok(())
}
