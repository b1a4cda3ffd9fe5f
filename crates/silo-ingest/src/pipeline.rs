//! The per-file processing pipeline.
//!
//! One file moves through four stages in order: extract, chunk, embed,
//! index. Any stage error fails the whole file; nothing is written to the
//! index until every chunk of the file has an embedding, so a file is
//! either fully indexed or not indexed at all.

use crate::chunker::{chunk_text, ChunkPlan};
use crate::error::{IngestError, IngestResult, Stage};
use crate::extract::extract;
use silo_core::{
    ChunkSink, EmbeddedChunk, Embedder, FileCandidate, SpeakerNamer, Transcriber, VisionDescriber,
};
use std::sync::Arc;
use tracing::debug;

/// Stateless processor for a single file candidate. Cheap to share across
/// worker tasks behind an `Arc`.
pub struct Pipeline {
    transcriber: Arc<dyn Transcriber>,
    describer: Arc<dyn VisionDescriber>,
    namer: Arc<dyn SpeakerNamer>,
    embedder: Arc<dyn Embedder>,
    sink: Arc<dyn ChunkSink>,
    plan: ChunkPlan,
}

impl Pipeline {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        describer: Arc<dyn VisionDescriber>,
        namer: Arc<dyn SpeakerNamer>,
        embedder: Arc<dyn Embedder>,
        sink: Arc<dyn ChunkSink>,
        plan: ChunkPlan,
    ) -> Self {
        Self {
            transcriber,
            describer,
            namer,
            embedder,
            sink,
            plan,
        }
    }

    /// Make sure the destination index exists. Called once per run, before
    /// any file is dispatched.
    pub async fn ensure_index(&self) -> IngestResult<()> {
        self.sink
            .ensure_index()
            .await
            .map_err(|e| IngestError::stage(Stage::Indexing, e))
    }

    /// Process one claimed file end to end. Returns how many chunks were
    /// indexed.
    pub async fn process(&self, candidate: &FileCandidate) -> IngestResult<usize> {
        let text = extract(
            candidate,
            self.transcriber.as_ref(),
            self.describer.as_ref(),
            self.namer.as_ref(),
        )
        .await?;

        let chunks = chunk_text(&candidate.file_id, &text, &self.plan);
        debug!("Chunked {} into {} chunks", candidate.file_id, chunks.len());

        let mut embedded = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let vector = self
                .embedder
                .embed(&chunk.text)
                .await
                .map_err(|e| IngestError::stage(Stage::Embedding, e))?;
            embedded.push(EmbeddedChunk { chunk, vector });
        }

        self.sink
            .upsert_chunks(&candidate.file_id, candidate.media_type, &embedded)
            .await
            .map_err(|e| IngestError::stage(Stage::Indexing, e))?;

        Ok(embedded.len())
    }
}
