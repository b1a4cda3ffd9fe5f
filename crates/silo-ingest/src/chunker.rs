//! Overlapping text chunker.
//!
//! Pure and deterministic: a window of `chunk_size` characters advances
//! across the text with a stride of `chunk_size - overlap`. Boundaries are
//! character offsets, never token- or sentence-aware, so concatenating the
//! chunks with each post-first overlap stripped reproduces the source text
//! exactly.

use crate::error::{IngestError, IngestResult};
use silo_core::{Chunk, FileId};

/// Validated chunking parameters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkPlan {
    chunk_size: usize,
    overlap_chars: usize,
}

impl ChunkPlan {
    /// Build a plan from a chunk size (characters) and an overlap fraction
    /// in [0, 1). Rejects configurations whose forward stride would not be
    /// strictly positive, since those chunk forever.
    pub fn new(chunk_size: usize, overlap_fraction: f64) -> IngestResult<Self> {
        if chunk_size == 0 {
            return Err(IngestError::InvalidChunking(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&overlap_fraction) {
            return Err(IngestError::InvalidChunking(format!(
                "overlap_fraction must be in [0, 1), got {}",
                overlap_fraction
            )));
        }

        let overlap_chars = (chunk_size as f64 * overlap_fraction) as usize;
        if overlap_chars >= chunk_size {
            return Err(IngestError::InvalidChunking(format!(
                "overlap of {} chars leaves no stride for chunk_size {}",
                overlap_chars, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            overlap_chars,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    /// Characters the window advances between chunks. Strictly positive.
    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap_chars
    }
}

/// Split `text` into overlapping chunks.
///
/// Text no longer than the chunk size (including empty text) yields exactly
/// one chunk equal to the whole text. The final chunk is truncated to
/// whatever remains, never padded.
pub fn chunk_text(file_id: &FileId, text: &str, plan: &ChunkPlan) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    if len <= plan.chunk_size() {
        return vec![Chunk {
            parent_file_id: file_id.clone(),
            sequence_index: 0,
            text: text.to_string(),
            start_offset: 0,
            end_offset: len,
            overlap_chars: 0,
        }];
    }

    let stride = plan.stride();
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut sequence_index = 0;

    loop {
        let end = usize::min(start + plan.chunk_size(), len);
        chunks.push(Chunk {
            parent_file_id: file_id.clone(),
            sequence_index,
            text: chars[start..end].iter().collect(),
            start_offset: start,
            end_offset: end,
            overlap_chars: if sequence_index == 0 {
                0
            } else {
                plan.overlap_chars()
            },
        });

        if end == len {
            break;
        }
        start += stride;
        sequence_index += 1;
    }

    chunks
}
