//! Ledger error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A complete/fail call found the record no longer held in_progress.
    /// Indicates concurrent interference or a stale-claim reclaim; always
    /// surfaced to operators, never silently ignored.
    #[error("lost claim on {file_id}: record is {found}, expected in_progress")]
    LostClaim { file_id: String, found: String },

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("ledger error: {0}")]
    Other(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
