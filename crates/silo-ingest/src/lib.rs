//! Silo Ingest - The ingestion orchestration engine.
//!
//! This crate is the core of silo: the pure overlap chunker, the per-media
//! extraction dispatch (including speaker attribution for audio/video), the
//! per-file pipeline state machine, and the bounded-concurrency scheduler
//! that drives a batch run against the ledger until done or deadline.

mod chunker;
mod error;
mod extract;
mod pipeline;
mod scheduler;

#[cfg(test)]
pub(crate) mod test_util;

pub use chunker::{chunk_text, ChunkPlan};
pub use error::{IngestError, IngestResult, Stage};
pub use extract::extract;
pub use pipeline::Pipeline;
pub use scheduler::Scheduler;
