//! Speaker attribution response handling.
//!
//! The model is asked to wrap its JSON in `<analysis>` tags. The response is
//! loosely typed, so every field is validated against the fixed schema
//! before use; any violation is a Permanent failure for the file.

use serde::Deserialize;
use silo_core::{ProviderError, ProviderResult, SpeakerAttribution};

/// Prompt asking the model to identify the speakers behind diarization labels.
pub const ATTRIBUTION_PROMPT: &str = r#"The transcript below uses anonymous speaker labels like [spk_0] and [spk_1].
Infer who each speaker is from context. If a speaker's name is never said,
use a short descriptive role (for example "Host" or "Guest expert") instead.

Respond with ONLY a JSON object wrapped in <analysis> tags, like:
<analysis>
{"speakers": [{"speakerId": "spk_0", "fullName": "Jane Doe", "bio": "One-sentence description."}]}
</analysis>

Transcript:
{transcript}"#;

#[derive(Debug, Deserialize)]
struct SpeakersEnvelope {
    speakers: Vec<SpeakerEntry>,
}

#[derive(Debug, Deserialize)]
struct SpeakerEntry {
    #[serde(rename = "speakerId")]
    speaker_id: String,
    #[serde(rename = "fullName")]
    full_name: String,
    bio: String,
}

/// Pull the JSON payload out of the `<analysis>` block. Falls back to the
/// whole response when the model skipped the tags.
fn extract_analysis(response: &str) -> &str {
    match (response.find("<analysis>"), response.find("</analysis>")) {
        (Some(start), Some(end)) if start + "<analysis>".len() <= end => {
            response[start + "<analysis>".len()..end].trim()
        }
        _ => response.trim(),
    }
}

/// Parse and schema-validate an attribution response.
///
/// Requirements: a `speakers` array; each entry has a label matching
/// `spk_<N>`, a non-empty name, and a bio.
pub fn parse_attribution_response(response: &str) -> ProviderResult<Vec<SpeakerAttribution>> {
    let payload = extract_analysis(response);

    let envelope: SpeakersEnvelope = serde_json::from_str(payload).map_err(|e| {
        ProviderError::Permanent(format!("attribution response is not valid JSON: {}", e))
    })?;

    let mut attributions = Vec::with_capacity(envelope.speakers.len());
    for entry in envelope.speakers {
        if !SpeakerAttribution::label_is_valid(&entry.speaker_id) {
            return Err(ProviderError::Permanent(format!(
                "attribution label {:?} does not match spk_<N>",
                entry.speaker_id
            )));
        }
        if entry.full_name.trim().is_empty() {
            return Err(ProviderError::Permanent(format!(
                "attribution for {} has an empty name",
                entry.speaker_id
            )));
        }
        attributions.push(SpeakerAttribution {
            label: entry.speaker_id,
            full_name: entry.full_name,
            bio: entry.bio,
        });
    }

    Ok(attributions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_tagged_response() {
        let response = r#"Here is my analysis.
<analysis>
{"speakers": [
  {"speakerId": "spk_0", "fullName": "Ada Lovelace", "bio": "Mathematician and podcast host."},
  {"speakerId": "spk_1", "fullName": "Guest expert", "bio": "Unnamed guest discussing compilers."}
]}
</analysis>"#;

        let speakers = parse_attribution_response(response).unwrap();
        assert_eq!(speakers.len(), 2);
        assert_eq!(speakers[0].label, "spk_0");
        assert_eq!(speakers[0].full_name, "Ada Lovelace");
        assert_eq!(speakers[1].full_name, "Guest expert");
    }

    #[test]
    fn test_parses_untagged_json() {
        let response = r#"{"speakers": [{"speakerId": "spk_0", "fullName": "Host", "bio": "-"}]}"#;
        let speakers = parse_attribution_response(response).unwrap();
        assert_eq!(speakers.len(), 1);
    }

    #[test]
    fn test_invalid_label_is_permanent() {
        let response = r#"{"speakers": [{"speakerId": "speaker_one", "fullName": "X", "bio": "-"}]}"#;
        let err = parse_attribution_response(response).unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("speaker_one"));
    }

    #[test]
    fn test_missing_field_is_permanent() {
        let response = r#"{"speakers": [{"speakerId": "spk_0", "bio": "-"}]}"#;
        assert!(parse_attribution_response(response).is_err());
    }

    #[test]
    fn test_non_json_is_permanent() {
        let err = parse_attribution_response("I could not determine the speakers.").unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_empty_name_rejected() {
        let response = r#"{"speakers": [{"speakerId": "spk_0", "fullName": "  ", "bio": "-"}]}"#;
        assert!(parse_attribution_response(response).is_err());
    }
}
