//! Silo Ledger - Durable record of per-file processing state.
//!
//! The ledger is the sole source of truth for "has this file been (or is it
//! being) processed". All mutation goes through four atomic operations:
//! claim, complete, fail, reset. Claims are conditional writes, so two
//! concurrent workers racing on the same file id resolve to exactly one
//! winner.

mod error;
mod ledger;
mod migrations;

pub use error::{LedgerError, LedgerResult};
pub use ledger::{ClaimOutcome, Ledger, StatusCounts, DEFAULT_STALE_AFTER_MINUTES};
