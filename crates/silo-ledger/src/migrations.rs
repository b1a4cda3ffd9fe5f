//! Ledger schema management.

use crate::error::LedgerResult;
use rusqlite::Connection;
use tracing::info;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the ledger schema. Idempotent.
pub fn initialize_schema(conn: &Connection) -> LedgerResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating initial ledger schema...");
        create_initial_schema(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    }

    Ok(())
}

fn get_schema_version(conn: &Connection) -> LedgerResult<i32> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> LedgerResult<()> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

fn create_initial_schema(conn: &Connection) -> LedgerResult<()> {
    conn.execute_batch(
        r#"
        -- One row per source file. file_id is derived from the source
        -- location, so re-uploads to the same path are the same record.
        CREATE TABLE IF NOT EXISTS files (
            file_id TEXT PRIMARY KEY,
            media_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'unclaimed',
            last_updated TEXT NOT NULL,
            error TEXT,
            retryable INTEGER,
            attempts INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_files_status ON files(status);
        "#,
    )?;

    Ok(())
}
