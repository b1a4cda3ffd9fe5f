//! Core domain types for the ingestion engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Stable identity of a source file, derived from its location (path or URI),
/// not from its content. Re-uploads to the same location are the same unit of work.
pub type FileId = String;

/// Generate a unique id for a batch run.
pub fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Media category of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Text,
    Image,
    Audio,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Text => "text",
            MediaType::Image => "image",
            MediaType::Audio => "audio",
            MediaType::Video => "video",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(MediaType::Text),
            "image" => Some(MediaType::Image),
            "audio" => Some(MediaType::Audio),
            "video" => Some(MediaType::Video),
            _ => None,
        }
    }

    /// Detect media type from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" | "md" | "markdown" | "vtt" | "srt" | "log" | "pdf" => Some(MediaType::Text),
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" => Some(MediaType::Image),
            "mp3" | "wav" | "flac" | "m4a" | "ogg" | "aac" => Some(MediaType::Audio),
            "mp4" | "webm" | "mov" | "mkv" | "avi" => Some(MediaType::Video),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A file proposed for ingestion by the discovery side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCandidate {
    /// Location-derived identity (canonical path or URI string).
    pub file_id: FileId,
    pub media_type: MediaType,
    /// Local handle to the bytes.
    pub path: PathBuf,
}

impl FileCandidate {
    pub fn new(file_id: impl Into<FileId>, media_type: MediaType, path: impl Into<PathBuf>) -> Self {
        Self {
            file_id: file_id.into(),
            media_type,
            path: path.into(),
        }
    }
}

/// Processing status of a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Unclaimed,
    InProgress,
    Done,
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Unclaimed => "unclaimed",
            RecordStatus::InProgress => "in_progress",
            RecordStatus::Done => "done",
            RecordStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unclaimed" => Some(RecordStatus::Unclaimed),
            "in_progress" => Some(RecordStatus::InProgress),
            "done" => Some(RecordStatus::Done),
            "failed" => Some(RecordStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One ledger row: the durable processing state of a single source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_id: FileId,
    pub media_type: MediaType,
    pub status: RecordStatus,
    /// Timestamp of the last status transition. Drives stale-claim reclaim.
    pub last_updated: DateTime<Utc>,
    /// Human-readable failure cause, present only when status is Failed.
    pub error: Option<String>,
    /// Whether the recorded failure was transient at the time it was exhausted.
    pub retryable: Option<bool>,
    /// How many times this file has been claimed.
    pub attempts: i32,
}

/// A bounded, possibly overlapping slice of a file's extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub parent_file_id: FileId,
    /// 0-based, monotonic within a file.
    pub sequence_index: usize,
    pub text: String,
    /// Character offset of the first char in the source text.
    pub start_offset: usize,
    /// Character offset one past the last char.
    pub end_offset: usize,
    /// Characters shared with the previous chunk (0 for the first).
    pub overlap_chars: usize,
}

/// A chunk paired with its embedding vector, ready for the index.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A span of transcribed speech carrying its diarization label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Diarization label, e.g. "spk_0".
    pub speaker_label: String,
    pub text: String,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
}

/// A proposed identity for one diarization label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerAttribution {
    /// Must match `spk_<digits>`.
    pub label: String,
    /// Best-effort name; a descriptive role when the name is unknown.
    pub full_name: String,
    pub bio: String,
}

impl SpeakerAttribution {
    /// Whether `label` has the required `spk_<digits>` shape.
    pub fn label_is_valid(label: &str) -> bool {
        label
            .strip_prefix("spk_")
            .map(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
            .unwrap_or(false)
    }
}

/// Why a file's outcome landed where it did in the run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedFile {
    pub file_id: FileId,
    pub cause: String,
}

/// Summary of one batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique id of this batch run, for correlating logs.
    pub run_id: String,
    pub done: usize,
    pub failed: usize,
    /// Candidates skipped because the ledger already has them done.
    pub skipped_done: usize,
    /// Candidates skipped because another worker currently holds the claim.
    pub skipped_in_progress: usize,
    /// Candidates skipped because a prior run recorded a terminal failure.
    pub skipped_failed: usize,
    /// Candidates never dispatched because the deadline elapsed first.
    pub abandoned: usize,
    pub failures: Vec<FailedFile>,
}

impl RunReport {
    pub fn total_considered(&self) -> usize {
        self.done
            + self.failed
            + self.skipped_done
            + self.skipped_in_progress
            + self.skipped_failed
            + self.abandoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_from_extension() {
        assert_eq!(MediaType::from_extension("mp4"), Some(MediaType::Video));
        assert_eq!(MediaType::from_extension("MP3"), Some(MediaType::Audio));
        assert_eq!(MediaType::from_extension("txt"), Some(MediaType::Text));
        assert_eq!(MediaType::from_extension("vtt"), Some(MediaType::Text));
        assert_eq!(MediaType::from_extension("pdf"), Some(MediaType::Text));
        assert_eq!(MediaType::from_extension("png"), Some(MediaType::Image));
        assert_eq!(MediaType::from_extension("exe"), None);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            RecordStatus::Unclaimed,
            RecordStatus::InProgress,
            RecordStatus::Done,
            RecordStatus::Failed,
        ] {
            assert_eq!(RecordStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(RecordStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_speaker_label_validation() {
        assert!(SpeakerAttribution::label_is_valid("spk_0"));
        assert!(SpeakerAttribution::label_is_valid("spk_12"));
        assert!(!SpeakerAttribution::label_is_valid("spk_"));
        assert!(!SpeakerAttribution::label_is_valid("spk_a"));
        assert!(!SpeakerAttribution::label_is_valid("speaker_0"));
        assert!(!SpeakerAttribution::label_is_valid("SPK_0"));
    }
}
