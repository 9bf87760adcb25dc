//! Database module for the channel catalog.
//!
//! This module provides SQLite-based persistent storage for:
//! - Channel catalog rows (NID/SID-based identity, display numbering)
//! - Program schedule rows used for present/following lookups

mod channel;
mod models;
mod program;
mod schema;

pub use channel::{ChannelRepository, ChannelStore, SaveOutcome};
pub use models::*;

use rusqlite::{Connection, ErrorCode, Result as SqliteResult};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Database error types.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Database path error: {0}")]
    PathError(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

impl DatabaseError {
    /// Split unique-constraint violations out of plain SQLite errors.
    pub(crate) fn from_write(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref err, ref message)
                if err.code == ErrorCode::ConstraintViolation =>
            {
                DatabaseError::Conflict(message.clone().unwrap_or_else(|| err.to_string()))
            }
            other => DatabaseError::Sqlite(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Shared handle used by the update pass, status pass and web API.
pub type DatabaseHandle = Arc<Mutex<Database>>;

/// Main database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::PathError(format!("{}: {}", parent.display(), e)))?;
            }
        }

        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        let db = Self { conn };
        db.initialize_schema()?;

        Ok(db)
    }

    /// Wrap in the shared handle type.
    pub fn into_handle(self) -> DatabaseHandle {
        Arc::new(Mutex::new(self))
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(schema::SCHEMA_SQL)?;
        self.apply_migrations()?;
        Ok(())
    }

    /// Add a column to a table if it doesn't exist.
    fn add_column_if_not_exists(
        &self,
        table: &str,
        column: &str,
        column_type: &str,
    ) -> Result<()> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let column_exists = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .filter_map(|r| r.ok())
            .any(|name| name == column);

        if !column_exists {
            let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, column_type);
            self.conn
                .execute(&sql, [])
                .map_err(|e| DatabaseError::MigrationFailed(format!("{}.{}: {}", table, column, e)))?;
            log::info!("Migration: Added column {} to table {}", column, table);
        }

        Ok(())
    }

    /// Apply pending migrations.
    fn apply_migrations(&self) -> Result<()> {
        // Catalogs written before the status pass existed lack jikkyo_force.
        self.add_column_if_not_exists("channels", "jikkyo_force", "INTEGER")?;
        // EDCB started reporting TSIDs later.
        self.add_column_if_not_exists("channels", "transport_stream_id", "INTEGER")?;
        Ok(())
    }

    /// Get the underlying connection (for advanced queries).
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction.
    pub fn transaction(&mut self) -> SqliteResult<rusqlite::Transaction<'_>> {
        self.conn.transaction()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.connection().is_autocommit());
    }

    #[test]
    fn test_schema_creation() {
        let db = Database::open_in_memory().unwrap();

        let count: i32 = db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('channels', 'programs')",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(count, 2);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.apply_migrations().unwrap();
        db.apply_migrations().unwrap();
    }

    #[test]
    fn test_unique_violation_maps_to_conflict() {
        let db = Database::open_in_memory().unwrap();
        let insert = "INSERT INTO channels (id, display_channel_id, network_id, service_id, remocon_id, channel_number, type, name)
                      VALUES (?1, 'gr011', 32736, 1024, 1, '011', 'GR', 'NHK')";
        db.connection().execute(insert, ["NID32736-SID1024"]).unwrap();

        let err = db
            .connection()
            .execute(insert, ["NID32737-SID1032"])
            .map_err(DatabaseError::from_write)
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));
    }
}
