//! Per-media extraction dispatch.
//!
//! Every media type reduces to plain text here. Audio and video go through
//! transcription and the speaker-attribution sub-step, so the text handed
//! to the chunker already cites named speakers rather than opaque labels.

use crate::error::{IngestError, IngestResult, Stage};
use silo_core::{
    FileCandidate, MediaType, ProviderError, SpeakerAttribution, SpeakerNamer, TranscriptSegment,
    Transcriber, VisionDescriber,
};
use std::collections::HashMap;
use tracing::{debug, info};

const UNKNOWN_SPEAKER: &str = "Unknown Speaker";

/// Extract plain text from a candidate file.
pub async fn extract(
    candidate: &FileCandidate,
    transcriber: &dyn Transcriber,
    describer: &dyn VisionDescriber,
    namer: &dyn SpeakerNamer,
) -> IngestResult<String> {
    let text = match candidate.media_type {
        MediaType::Text => read_text(candidate).await?,
        MediaType::Image => describer
            .describe(&candidate.path)
            .await
            .map_err(|e| IngestError::stage(Stage::Extracting, e))?,
        MediaType::Audio | MediaType::Video => {
            let segments = transcriber
                .transcribe(&candidate.path)
                .await
                .map_err(|e| IngestError::stage(Stage::Extracting, e))?;
            attribute_and_merge(&candidate.file_id, &segments, namer).await?
        }
    };

    debug!(
        "Extracted {} chars from {} ({})",
        text.chars().count(),
        candidate.file_id,
        candidate.media_type
    );
    Ok(text)
}

/// Direct read with lossy UTF-8 decoding; malformed bytes become
/// replacement characters rather than failing the file. PDFs go through
/// the PDF text extractor instead.
async fn read_text(candidate: &FileCandidate) -> IngestResult<String> {
    let is_pdf = candidate
        .path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        return read_pdf(candidate).await;
    }

    let bytes = tokio::fs::read(&candidate.path).await.map_err(|e| {
        IngestError::stage(
            Stage::Extracting,
            ProviderError::Permanent(format!("cannot read {}: {}", candidate.path.display(), e)),
        )
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// PDF text extraction. The parser is CPU-bound, so it runs on the
/// blocking pool; parse failures are Permanent for the file.
async fn read_pdf(candidate: &FileCandidate) -> IngestResult<String> {
    let path = candidate.path.clone();
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&path))
        .await
        .map_err(|e| {
            IngestError::stage(
                Stage::Extracting,
                ProviderError::Permanent(format!("pdf extraction task failed: {}", e)),
            )
        })?
        .map_err(|e| {
            IngestError::stage(
                Stage::Extracting,
                ProviderError::Permanent(format!(
                    "cannot extract text from {}: {}",
                    candidate.path.display(),
                    e
                )),
            )
        })?;
    Ok(clean_pdf_text(&text))
}

/// Trim lines, collapse runs of blank lines, and turn form-feed page
/// breaks into paragraph breaks.
pub(crate) fn clean_pdf_text(text: &str) -> String {
    let unpaged = text.replace('\x0C', "\n\n");
    let mut lines: Vec<&str> = Vec::new();
    for line in unpaged.lines().map(str::trim) {
        let last_was_empty = lines.last().map(|l| l.is_empty()).unwrap_or(false);
        if !(line.is_empty() && last_was_empty) {
            lines.push(line);
        }
    }
    lines.join("\n")
}

/// Run the attribution sub-step over a labelled transcript and substitute
/// speaker names into the text before handoff to the chunker.
async fn attribute_and_merge(
    file_id: &str,
    segments: &[TranscriptSegment],
    namer: &dyn SpeakerNamer,
) -> IngestResult<String> {
    if segments.is_empty() {
        return Ok(String::new());
    }

    let labelled = labelled_transcript(segments);
    let attributions = namer
        .identify(&labelled)
        .await
        .map_err(|e| IngestError::stage(Stage::Extracting, e))?;

    info!(
        "Attributed {} speaker labels for {}",
        attributions.len(),
        file_id
    );

    Ok(merge_attributions(segments, &attributions))
}

/// Render segments with their raw diarization labels, one per line.
/// This is the form the attribution provider sees.
pub(crate) fn labelled_transcript(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|s| format!("[{}] {}", s.speaker_label, s.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Substitute names for labels and prepend the speaker roster, so chunks
/// carry the name and bio alongside the words (downstream citations then
/// resolve to people, not labels).
pub(crate) fn merge_attributions(
    segments: &[TranscriptSegment],
    attributions: &[SpeakerAttribution],
) -> String {
    let by_label: HashMap<&str, &SpeakerAttribution> = attributions
        .iter()
        .map(|a| (a.label.as_str(), a))
        .collect();

    let mut out = String::new();
    for attribution in attributions {
        out.push_str(&format!(
            "Speaker {}: {}\n",
            attribution.full_name, attribution.bio
        ));
    }
    if !out.is_empty() {
        out.push('\n');
    }

    let body = segments
        .iter()
        .map(|s| {
            let name = by_label
                .get(s.speaker_label.as_str())
                .map(|a| a.full_name.as_str())
                .unwrap_or(UNKNOWN_SPEAKER);
            format!("[{}] {}", name, s.text)
        })
        .collect::<Vec<_>>()
        .join("\n");

    out.push_str(&body);
    out
}
