//! Contracts for the external providers the pipeline calls.
//!
//! The orchestration core is written against these traits; the HTTP-backed
//! implementations live in `silo-provider` and `silo-index`.

use crate::error::ProviderResult;
use crate::types::{EmbeddedChunk, FileId, MediaType, SpeakerAttribution, TranscriptSegment};
use async_trait::async_trait;
use std::path::Path;

/// Turns a text passage into an embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>>;
}

/// Transcribes audio or video into speaker-labelled segments.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, path: &Path) -> ProviderResult<Vec<TranscriptSegment>>;
}

/// Produces a textual description of an image.
#[async_trait]
pub trait VisionDescriber: Send + Sync {
    async fn describe(&self, path: &Path) -> ProviderResult<String>;
}

/// Proposes a name and bio for each diarization label in a transcript.
///
/// Responses must pass schema validation (a `speakers` array whose entries
/// carry a `spk_<N>` label, a name, and a bio); anything else is Permanent.
#[async_trait]
pub trait SpeakerNamer: Send + Sync {
    async fn identify(&self, labelled_transcript: &str) -> ProviderResult<Vec<SpeakerAttribution>>;
}

/// The vector index. Upserts are keyed by deterministic chunk ids, so
/// re-running a file overwrites rather than duplicates.
#[async_trait]
pub trait ChunkSink: Send + Sync {
    /// Create the index if missing. Called once per run, before any write.
    async fn ensure_index(&self) -> ProviderResult<()>;

    /// Write all of one file's chunks. Either the whole batch lands or the
    /// call fails; the pipeline never indexes a file partially.
    async fn upsert_chunks(
        &self,
        file_id: &FileId,
        media_type: MediaType,
        chunks: &[EmbeddedChunk],
    ) -> ProviderResult<()>;
}
