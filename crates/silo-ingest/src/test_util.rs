//! In-memory provider fakes for pipeline and scheduler tests.

use async_trait::async_trait;
use silo_core::{
    ChunkSink, EmbeddedChunk, Embedder, FileId, MediaType, ProviderError, ProviderResult,
    SpeakerAttribution, SpeakerNamer, TranscriptSegment, Transcriber, VisionDescriber,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeTranscriber {
    pub segments: Vec<TranscriptSegment>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _path: &Path) -> ProviderResult<Vec<TranscriptSegment>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.segments.clone())
    }
}

pub struct FakeDescriber {
    pub description: String,
    pub calls: AtomicUsize,
}

impl FakeDescriber {
    pub fn new(description: &str) -> Self {
        Self {
            description: description.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VisionDescriber for FakeDescriber {
    async fn describe(&self, _path: &Path) -> ProviderResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.description.clone())
    }
}

#[derive(Default)]
pub struct FakeNamer {
    pub attributions: Vec<SpeakerAttribution>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl SpeakerNamer for FakeNamer {
    async fn identify(&self, _transcript: &str) -> ProviderResult<Vec<SpeakerAttribution>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.attributions.clone())
    }
}

/// Counts embedding calls; fails permanently on texts containing `poison`
/// and panics on texts containing `panic_on`.
#[derive(Default)]
pub struct CountingEmbedder {
    pub calls: AtomicUsize,
    pub poison: Option<String>,
    pub panic_on: Option<String>,
}

impl CountingEmbedder {
    pub fn poisoned_by(marker: &str) -> Self {
        Self {
            poison: Some(marker.to_string()),
            ..Self::default()
        }
    }

    pub fn panicking_on(marker: &str) -> Self {
        Self {
            panic_on: Some(marker.to_string()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.panic_on {
            if text.contains(marker) {
                panic!("embedder fault injection");
            }
        }
        if let Some(marker) = &self.poison {
            if text.contains(marker) {
                return Err(ProviderError::Permanent("embedding rejected".to_string()));
            }
        }
        Ok(vec![0.1, 0.2, 0.3])
    }
}

/// Records upserts per file id.
#[derive(Default)]
pub struct RecordingSink {
    pub ensure_calls: AtomicUsize,
    pub upserts: Mutex<HashMap<FileId, Vec<EmbeddedChunk>>>,
}

impl RecordingSink {
    pub fn indexed_files(&self) -> usize {
        self.upserts.lock().unwrap().len()
    }

    pub fn chunks_for(&self, file_id: &str) -> Option<Vec<EmbeddedChunk>> {
        self.upserts.lock().unwrap().get(file_id).cloned()
    }
}

#[async_trait]
impl ChunkSink for RecordingSink {
    async fn ensure_index(&self) -> ProviderResult<()> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn upsert_chunks(
        &self,
        file_id: &FileId,
        _media_type: MediaType,
        chunks: &[EmbeddedChunk],
    ) -> ProviderResult<()> {
        self.upserts
            .lock()
            .unwrap()
            .insert(file_id.clone(), chunks.to_vec());
        Ok(())
    }
}
