pub mod migrations;
pub mod schema;

use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;

use crate::error::Result;

/// Open (or create) the cold-tier database at the given path with schema
/// initialized and migrations applied.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(path)?;

    // WAL keeps readers unblocked while tiering writes a batch
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(std::time::Duration::from_millis(5000))?;

    schema::init_schema(&conn)?;
    migrations::run_migrations(&conn)?;

    tracing::info!(path = %path.display(), "cold tier database initialized");
    Ok(conn)
}

/// Open an in-memory cold tier (tests, throwaway stores).
pub fn open_memory_database() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    schema::init_schema(&conn)?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}

/// Result of [`check_database_health`].
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub schema_version: u32,
    pub vector_dim: Option<usize>,
    pub record_count: u64,
}

/// Run `PRAGMA integrity_check` and collect schema/row-count facts.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity_details: String =
        conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    let record_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM singularity", [], |row| row.get(0))?;

    Ok(HealthReport {
        integrity_ok: integrity_details == "ok",
        integrity_details,
        schema_version: migrations::get_schema_version(conn)?,
        vector_dim: migrations::get_vector_dim(conn)?,
        record_count: record_count as u64,
    })
}
