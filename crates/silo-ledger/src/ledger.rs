//! The ledger handle and its four atomic operations.

use crate::error::{LedgerError, LedgerResult};
use crate::migrations;
use chrono::{DateTime, Duration, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use silo_core::{FileId, FileRecord, MediaType, RecordStatus};
use std::path::Path;
use tracing::{debug, error, info};

/// Default reclaim threshold for records stuck in_progress, in minutes.
/// Matches the overall two-hour ceiling of a batch run.
pub const DEFAULT_STALE_AFTER_MINUTES: i64 = 120;

type ConnectionPool = Pool<SqliteConnectionManager>;
type PooledConn = PooledConnection<SqliteConnectionManager>;

/// Outcome of a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller now holds exclusive processing rights.
    Acquired,
    /// A previous run already finished this file.
    AlreadyDone,
    /// Another worker currently holds the claim (and it is not stale).
    AlreadyInProgress,
    /// A previous run recorded a terminal failure; only reset clears it.
    AlreadyFailed,
}

/// Record counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub unclaimed: i64,
    pub in_progress: i64,
    pub done: i64,
    pub failed: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.unclaimed + self.in_progress + self.done + self.failed
    }
}

/// Handle to the processing ledger.
#[derive(Clone)]
pub struct Ledger {
    pool: ConnectionPool,
    stale_after: Duration,
}

impl Ledger {
    /// Open (or create) a ledger at the given path.
    pub fn open<P: AsRef<Path>>(path: P, stale_after_minutes: i64) -> LedgerResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LedgerError::Other(e.to_string()))?;
        }

        info!("Opening ledger at: {}", path.display());

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;",
            )?;
            Ok(())
        });

        let pool = Pool::builder().max_size(10).build(manager)?;

        {
            let conn = pool.get()?;
            migrations::initialize_schema(&conn)?;
        }

        Ok(Self {
            pool,
            stale_after: Duration::minutes(stale_after_minutes),
        })
    }

    /// Open an in-memory ledger (for testing).
    pub fn open_in_memory() -> LedgerResult<Self> {
        let manager = SqliteConnectionManager::memory();

        // Memory DB only supports a single connection.
        let pool = Pool::builder().max_size(1).build(manager)?;

        {
            let conn = pool.get()?;
            migrations::initialize_schema(&conn)?;
        }

        Ok(Self {
            pool,
            stale_after: Duration::minutes(DEFAULT_STALE_AFTER_MINUTES),
        })
    }

    /// Override the stale-claim threshold.
    pub fn with_stale_after_minutes(mut self, minutes: i64) -> Self {
        self.stale_after = Duration::minutes(minutes);
        self
    }

    fn conn(&self) -> LedgerResult<PooledConn> {
        self.pool.get().map_err(LedgerError::from)
    }

    /// Attempt to acquire exclusive processing rights over a file.
    ///
    /// The record is created as `unclaimed` if absent, then a single
    /// conditional UPDATE moves it to `in_progress` only when it is
    /// `unclaimed` or stuck `in_progress` past the staleness threshold.
    /// Under concurrent attempts exactly one caller sees `Acquired`.
    pub fn claim(&self, file_id: &FileId, media_type: MediaType) -> LedgerResult<ClaimOutcome> {
        let conn = self.conn()?;
        let now = Utc::now();
        let stale_cutoff = (now - self.stale_after).to_rfc3339();

        conn.execute(
            "INSERT OR IGNORE INTO files (file_id, media_type, status, last_updated, attempts)
             VALUES (?1, ?2, 'unclaimed', ?3, 0)",
            params![file_id, media_type.as_str(), now.to_rfc3339()],
        )?;

        let rows = conn.execute(
            "UPDATE files
             SET status = 'in_progress', last_updated = ?2, attempts = attempts + 1,
                 error = NULL, retryable = NULL
             WHERE file_id = ?1
               AND (status = 'unclaimed'
                    OR (status = 'in_progress' AND last_updated < ?3))",
            params![file_id, now.to_rfc3339(), stale_cutoff],
        )?;

        if rows == 1 {
            debug!("Claimed {}", file_id);
            return Ok(ClaimOutcome::Acquired);
        }

        // Lost the conditional write; report why.
        let record = self.require(&conn, file_id)?;
        let outcome = match record.status {
            RecordStatus::Done => ClaimOutcome::AlreadyDone,
            RecordStatus::Failed => ClaimOutcome::AlreadyFailed,
            // Unclaimed here means another claimant won between our two
            // statements and has already moved on; treat it as held.
            RecordStatus::InProgress | RecordStatus::Unclaimed => ClaimOutcome::AlreadyInProgress,
        };
        debug!("Claim on {} refused: {:?}", file_id, outcome);
        Ok(outcome)
    }

    /// Transition `in_progress -> done`. Fails loudly with `LostClaim` if
    /// the record is not currently held.
    pub fn complete(&self, file_id: &FileId) -> LedgerResult<()> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE files SET status = 'done', last_updated = ?2
             WHERE file_id = ?1 AND status = 'in_progress'",
            params![file_id, Utc::now().to_rfc3339()],
        )?;

        if rows == 0 {
            return Err(self.lost_claim(&conn, file_id));
        }
        Ok(())
    }

    /// Transition `in_progress -> failed`, recording the cause.
    pub fn fail(&self, file_id: &FileId, cause: &str, retryable: bool) -> LedgerResult<()> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE files SET status = 'failed', error = ?2, retryable = ?3, last_updated = ?4
             WHERE file_id = ?1 AND status = 'in_progress'",
            params![file_id, cause, retryable, Utc::now().to_rfc3339()],
        )?;

        if rows == 0 {
            return Err(self.lost_claim(&conn, file_id));
        }
        Ok(())
    }

    /// Clear every record, forcing full reprocessing on the next run.
    /// Used only by the explicit administrative reset path.
    /// Returns how many records were removed.
    pub fn reset(&self) -> LedgerResult<i64> {
        let conn = self.conn()?;
        let before: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        conn.execute("DELETE FROM files", [])?;
        info!("Ledger reset: removed {} records", before);
        Ok(before)
    }

    /// Fetch a single record, if present.
    pub fn get(&self, file_id: &FileId) -> LedgerResult<Option<FileRecord>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            "SELECT file_id, media_type, status, last_updated, error, retryable, attempts
             FROM files WHERE file_id = ?1",
            params![file_id],
            row_to_record,
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(LedgerError::from(e)),
        }
    }

    /// Record counts by status.
    pub fn counts(&self) -> LedgerResult<StatusCounts> {
        let conn = self.conn()?;
        let mut counts = StatusCounts::default();

        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM files GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status, count) = row?;
            match RecordStatus::from_str(&status) {
                Some(RecordStatus::Unclaimed) => counts.unclaimed = count,
                Some(RecordStatus::InProgress) => counts.in_progress = count,
                Some(RecordStatus::Done) => counts.done = count,
                Some(RecordStatus::Failed) => counts.failed = count,
                None => {}
            }
        }

        Ok(counts)
    }

    /// All records currently in the failed state, oldest first.
    pub fn list_failed(&self) -> LedgerResult<Vec<FileRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT file_id, media_type, status, last_updated, error, retryable, attempts
             FROM files WHERE status = 'failed' ORDER BY last_updated ASC",
        )?;
        let rows = stmt.query_map([], row_to_record)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(LedgerError::from)
    }

    fn require(&self, conn: &PooledConn, file_id: &FileId) -> LedgerResult<FileRecord> {
        conn.query_row(
            "SELECT file_id, media_type, status, last_updated, error, retryable, attempts
             FROM files WHERE file_id = ?1",
            params![file_id],
            row_to_record,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => LedgerError::NotFound(file_id.clone()),
            _ => LedgerError::from(e),
        })
    }

    fn lost_claim(&self, conn: &PooledConn, file_id: &FileId) -> LedgerError {
        let found = match self.require(conn, file_id) {
            Ok(record) => record.status.to_string(),
            Err(_) => "absent".to_string(),
        };
        error!(
            "Lost claim on {}: record is {}, expected in_progress",
            file_id, found
        );
        LedgerError::LostClaim {
            file_id: file_id.clone(),
            found,
        }
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<FileRecord> {
    let media_type_str: String = row.get(1)?;
    let status_str: String = row.get(2)?;
    let last_updated_str: String = row.get(3)?;

    Ok(FileRecord {
        file_id: row.get(0)?,
        media_type: MediaType::from_str(&media_type_str).unwrap_or(MediaType::Text),
        status: RecordStatus::from_str(&status_str).unwrap_or(RecordStatus::Unclaimed),
        last_updated: DateTime::parse_from_rfc3339(&last_updated_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        error: row.get(4)?,
        retryable: row.get(5)?,
        attempts: row.get(6)?,
    })
}
